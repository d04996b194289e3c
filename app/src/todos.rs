//! Todo store and todo adapter.
//!
//! The collection is a read-through cache of one live query: every snapshot
//! replaces it wholesale. Writes go to the document store first and are then
//! mirrored locally so the change shows before the next snapshot arrives.

use crate::environment::TodoEnvironment;
use crate::model::{NewTodo, TodoId, TodoItem, TodoPatch, UserId};
use crate::providers::DocumentStore;
use futures::StreamExt;
use livetodo_core::effect::{Effect, EffectId};
use livetodo_core::reducer::Reducer;
use livetodo_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Cancellation key of the live query
pub const TODOS_LIVE: EffectId = EffectId::new("todos.live");

/// Todo store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoState {
    /// Items in snapshot order
    pub todos: Vec<TodoItem>,
    /// Waiting for the first snapshot of the current subscription
    pub loading: bool,
    /// Last failure message
    pub error: Option<String>,
    /// Identity the live query is scoped to
    pub owner: Option<UserId>,
}

impl TodoState {
    /// Looks up an item by id
    #[must_use]
    pub fn get(&self, id: &TodoId) -> Option<&TodoItem> {
        self.todos.iter().find(|todo| &todo.id == id)
    }

    /// Number of items
    #[must_use]
    pub fn count(&self) -> usize {
        self.todos.len()
    }

    /// Number of completed items
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.todos.iter().filter(|todo| todo.completed).count()
    }

    fn is_current(&self, owner: &UserId) -> bool {
        self.owner.as_ref() == Some(owner)
    }
}

/// Subscription lifecycle, write requests and their outcomes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TodoAction {
    /// Open the live query for `owner`, replacing any previous one
    Subscribe {
        /// Identity to scope the query to
        owner: UserId,
    },
    /// Close the live query and forget the collection
    Unsubscribe,
    /// A full query result
    SnapshotReceived {
        /// Identity the query was opened for
        owner: UserId,
        /// Every matching item
        todos: Vec<TodoItem>,
    },
    /// The live query reported an error
    SubscriptionFailed {
        /// Identity the query was opened for
        owner: UserId,
        /// Error message
        message: String,
    },
    /// Create a todo for the current identity
    Create {
        /// Description
        text: String,
    },
    /// The store accepted a new todo
    Created {
        /// The stored item with its assigned id
        item: TodoItem,
    },
    /// Change some fields of a todo
    Update {
        /// Target
        id: TodoId,
        /// Fields to write
        patch: TodoPatch,
    },
    /// The store accepted an update
    Updated {
        /// Target
        id: TodoId,
        /// Fields written
        patch: TodoPatch,
    },
    /// Remove a todo
    Delete {
        /// Target
        id: TodoId,
    },
    /// The store accepted a delete
    Deleted {
        /// Target
        id: TodoId,
    },
    /// A write was rejected
    OperationFailed {
        /// Error message
        message: String,
    },
}

/// Todo adapter
#[derive(Debug, Clone)]
pub struct TodoReducer<D> {
    _store: PhantomData<fn() -> D>,
}

impl<D> TodoReducer<D> {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _store: PhantomData,
        }
    }
}

impl<D> Default for TodoReducer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> TodoReducer<D>
where
    D: DocumentStore + Clone + 'static,
{
    fn live_query(owner: UserId, env: &TodoEnvironment<D>) -> Effect<TodoAction> {
        let snapshots = env.documents.watch_todos(&owner).map(move |result| match result {
            Ok(todos) => TodoAction::SnapshotReceived {
                owner: owner.clone(),
                todos,
            },
            Err(error) => TodoAction::SubscriptionFailed {
                owner: owner.clone(),
                message: error.to_string(),
            },
        });
        Effect::Stream(Box::pin(snapshots)).cancellable(TODOS_LIVE)
    }
}

impl<D> Reducer for TodoReducer<D>
where
    D: DocumentStore + Clone + 'static,
{
    type State = TodoState;
    type Action = TodoAction;
    type Environment = TodoEnvironment<D>;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Subscription ==========
            TodoAction::Subscribe { owner } => {
                tracing::debug!(%owner, "opening live query");
                state.todos.clear();
                state.owner = Some(owner.clone());
                state.loading = true;
                smallvec![Self::live_query(owner, env)]
            },

            TodoAction::Unsubscribe => {
                tracing::debug!("closing live query");
                state.todos.clear();
                state.owner = None;
                state.loading = false;
                smallvec![Effect::Cancel(TODOS_LIVE)]
            },

            TodoAction::SnapshotReceived { owner, todos } => {
                if !state.is_current(&owner) {
                    tracing::debug!(%owner, "discarding stale snapshot");
                    return smallvec![Effect::None];
                }
                state.todos = todos;
                state.loading = false;
                state.error = None;
                smallvec![Effect::None]
            },

            TodoAction::SubscriptionFailed { owner, message } => {
                if state.is_current(&owner) {
                    tracing::warn!(%owner, %message, "live query failed");
                    state.error = Some(message);
                    state.loading = false;
                }
                smallvec![Effect::None]
            },

            // ========== Writes ==========
            TodoAction::Create { text } => {
                let Some(owner) = state.owner.clone() else {
                    tracing::debug!("create ignored without an identity");
                    return smallvec![Effect::None];
                };

                let documents = env.documents.clone();
                smallvec![Effect::future(async move {
                    Some(match documents.create_todo(NewTodo::new(text, owner)).await {
                        Ok(item) => TodoAction::Created { item },
                        Err(error) => TodoAction::OperationFailed {
                            message: error.to_string(),
                        },
                    })
                })]
            },

            TodoAction::Created { item } => {
                if state.is_current(&item.user_id) && state.get(&item.id).is_none() {
                    state.todos.push(item);
                }
                smallvec![Effect::None]
            },

            TodoAction::Update { id, patch } => {
                if patch.is_empty() {
                    tracing::debug!(%id, "empty patch ignored");
                    return smallvec![Effect::None];
                }
                let documents = env.documents.clone();
                smallvec![Effect::future(async move {
                    Some(match documents.update_todo(&id, &patch).await {
                        Ok(()) => TodoAction::Updated { id, patch },
                        Err(error) => TodoAction::OperationFailed {
                            message: error.to_string(),
                        },
                    })
                })]
            },

            TodoAction::Updated { id, patch } => {
                if let Some(todo) = state.todos.iter_mut().find(|todo| todo.id == id) {
                    todo.apply(&patch);
                }
                smallvec![Effect::None]
            },

            TodoAction::Delete { id } => {
                let documents = env.documents.clone();
                smallvec![Effect::future(async move {
                    Some(match documents.delete_todo(&id).await {
                        Ok(()) => TodoAction::Deleted { id },
                        Err(error) => TodoAction::OperationFailed {
                            message: error.to_string(),
                        },
                    })
                })]
            },

            TodoAction::Deleted { id } => {
                state.todos.retain(|todo| todo.id != id);
                smallvec![Effect::None]
            },

            TodoAction::OperationFailed { message } => {
                tracing::warn!(%message, "todo write failed");
                let notification = env.notifications.failure(message.clone());
                state.error = Some(message);
                smallvec![env.notifications.notify(notification)]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;
    use crate::error::DocumentError;
    use crate::memory::MemoryDocumentStore;
    use crate::notifications::NotificationCenter;
    use livetodo_testing::{ReducerTest, assertions, helpers::resolve_futures};

    type Test = ReducerTest<
        TodoReducer<MemoryDocumentStore>,
        TodoState,
        TodoAction,
        TodoEnvironment<MemoryDocumentStore>,
    >;

    fn env() -> TodoEnvironment<MemoryDocumentStore> {
        TodoEnvironment::new(MemoryDocumentStore::new(), NotificationCenter::new())
    }

    fn test() -> Test {
        ReducerTest::new(TodoReducer::new())
            .with_env(env())
            .given_state(TodoState::default())
    }

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn item(id: &str, owner: &UserId) -> TodoItem {
        TodoItem {
            id: TodoId::new(id),
            text: format!("todo {id}"),
            completed: false,
            user_id: owner.clone(),
            created_at: None,
        }
    }

    fn subscribed(owner: UserId, todos: Vec<TodoItem>) -> TodoState {
        TodoState {
            todos,
            loading: false,
            error: None,
            owner: Some(owner),
        }
    }

    #[test]
    fn test_subscribe_clears_and_opens_live_query() {
        test()
            .given_state(subscribed(UserId::new("bob"), vec![item("b1", &UserId::new("bob"))]))
            .when_action(TodoAction::Subscribe { owner: alice() })
            .then_state(|state| {
                assert!(state.todos.is_empty());
                assert!(state.loading);
                assert_eq!(state.owner, Some(alice()));
            })
            .then_effects(|effects| assertions::assert_starts_stream(effects, &TODOS_LIVE))
            .run();
    }

    #[test]
    fn test_snapshot_replaces_collection() {
        let owner = alice();
        let fresh = vec![item("a2", &owner), item("a3", &owner)];
        let expected = fresh.clone();
        test()
            .given_state(TodoState {
                loading: true,
                error: Some("old".to_string()),
                ..subscribed(owner.clone(), vec![item("a1", &owner)])
            })
            .when_action(TodoAction::SnapshotReceived { owner, todos: fresh })
            .then_state(move |state| {
                assert_eq!(state.todos, expected);
                assert!(!state.loading);
                assert_eq!(state.error, None);
            })
            .run();
    }

    #[test]
    fn test_stale_snapshot_is_discarded() {
        let bob = UserId::new("bob");
        test()
            .given_state(subscribed(alice(), vec![]))
            .when_action(TodoAction::SnapshotReceived {
                owner: bob.clone(),
                todos: vec![item("b1", &bob)],
            })
            .then_state(|state| assert!(state.todos.is_empty()))
            .run();
    }

    #[test]
    fn test_create_without_identity_is_noop() {
        test()
            .when_action(TodoAction::Create {
                text: "milk".to_string(),
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_empty_patch_is_not_written() {
        let owner = alice();
        test()
            .given_state(subscribed(owner.clone(), vec![item("a1", &owner)]))
            .when_action(TodoAction::Update {
                id: TodoId::new("a1"),
                patch: TodoPatch::default(),
            })
            .then_state(|state| {
                assert_eq!(state.todos[0].text, "todo a1");
                assert_eq!(state.error, None);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_created_skips_ids_already_delivered() {
        let owner = alice();
        let existing = item("a1", &owner);
        test()
            .given_state(subscribed(owner, vec![existing.clone()]))
            .when_action(TodoAction::Created { item: existing })
            .then_state(|state| assert_eq!(state.count(), 1))
            .run();
    }

    #[test]
    fn test_created_appends_optimistic_copy() {
        let owner = alice();
        test()
            .given_state(subscribed(owner.clone(), vec![item("a1", &owner)]))
            .when_action(TodoAction::Created {
                item: item("a2", &owner),
            })
            .then_state(|state| {
                assert_eq!(state.count(), 2);
                assert_eq!(state.todos[1].id, TodoId::new("a2"));
            })
            .run();
    }

    #[test]
    fn test_updated_merges_only_patched_fields() {
        let owner = alice();
        test()
            .given_state(subscribed(owner.clone(), vec![item("a1", &owner), item("a2", &owner)]))
            .when_action(TodoAction::Updated {
                id: TodoId::new("a2"),
                patch: TodoPatch::completed(true),
            })
            .then_state(|state| {
                assert!(!state.todos[0].completed);
                assert!(state.todos[1].completed);
                assert_eq!(state.todos[1].text, "todo a2");
            })
            .run();
    }

    #[test]
    fn test_deleted_removes_exactly_one() {
        let owner = alice();
        test()
            .given_state(subscribed(owner.clone(), vec![item("a1", &owner), item("a2", &owner)]))
            .when_action(TodoAction::Deleted {
                id: TodoId::new("a1"),
            })
            .then_state(|state| {
                assert_eq!(state.count(), 1);
                assert!(state.get(&TodoId::new("a2")).is_some());
            })
            .run();
    }

    #[test]
    fn test_operation_failed_sets_only_error() {
        let owner = alice();
        let todos = vec![item("a1", &owner)];
        let expected = todos.clone();
        test()
            .given_state(subscribed(owner, todos))
            .when_action(TodoAction::OperationFailed {
                message: "denied".to_string(),
            })
            .then_state(move |state| {
                assert_eq!(state.error.as_deref(), Some("denied"));
                assert_eq!(state.todos, expected);
                assert!(!state.loading);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_unsubscribe_cancels_live_query() {
        test()
            .given_state(subscribed(alice(), vec![item("a1", &alice())]))
            .when_action(TodoAction::Unsubscribe)
            .then_state(|state| {
                assert!(state.todos.is_empty());
                assert_eq!(state.owner, None);
            })
            .then_effects(|effects| assertions::assert_cancels(effects, &TODOS_LIVE))
            .run();
    }

    #[tokio::test]
    async fn test_failed_write_resolves_to_operation_failed() {
        let env = env();
        env.documents
            .fail_writes_with(Some(DocumentError::PermissionDenied("rules".to_string())));
        let mut state = subscribed(alice(), vec![]);

        let effects = TodoReducer::new().reduce(
            &mut state,
            TodoAction::Create {
                text: "milk".to_string(),
            },
            &env,
        );
        let actions = resolve_futures(effects.into_vec()).await;
        assert_eq!(
            actions,
            vec![TodoAction::OperationFailed {
                message: "Missing or insufficient permissions: rules".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let env = env();
        let mut state = subscribed(alice(), vec![]);
        let effects = TodoReducer::new().reduce(
            &mut state,
            TodoAction::Update {
                id: TodoId::new("nope"),
                patch: TodoPatch::completed(true),
            },
            &env,
        );
        let actions = resolve_futures(effects.into_vec()).await;
        assert!(matches!(actions.as_slice(), [TodoAction::OperationFailed { .. }]));
    }
}

//! The composed application reducer.
//!
//! Both adapters are scoped into one [`AppState`]. After every action the
//! composition compares the signed-in identity with the identity the live
//! query is scoped to, and subscribes or unsubscribes the todo adapter when
//! they differ. Login, signup, restore, logout and provider sign-outs all go
//! through this one check.

use crate::environment::{AppEnvironment, SessionEnvironment, TodoEnvironment};
use crate::providers::{DocumentStore, IdentityProvider};
use crate::session::{SessionAction, SessionReducer, SessionState};
use crate::todos::{TodoAction, TodoReducer, TodoState};
use livetodo_core::SmallVec;
use livetodo_core::composition::{ScopedReducer, scope_reducer};
use livetodo_core::effect::Effect;
use livetodo_core::reducer::Reducer;

/// Both stores
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppState {
    /// Session store
    pub session: SessionState,
    /// Todo store
    pub todos: TodoState,
}

/// Any action of either adapter
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppAction {
    /// Auth adapter action
    Session(SessionAction),
    /// Todo adapter action
    Todos(TodoAction),
}

impl From<SessionAction> for AppAction {
    fn from(action: SessionAction) -> Self {
        Self::Session(action)
    }
}

impl From<TodoAction> for AppAction {
    fn from(action: TodoAction) -> Self {
        Self::Todos(action)
    }
}

type ScopedSession<I, D> = ScopedReducer<
    AppState,
    SessionState,
    AppAction,
    SessionAction,
    AppEnvironment<I, D>,
    SessionEnvironment<I>,
    SessionReducer<I>,
>;

type ScopedTodos<I, D> = ScopedReducer<
    AppState,
    TodoState,
    AppAction,
    TodoAction,
    AppEnvironment<I, D>,
    TodoEnvironment<D>,
    TodoReducer<D>,
>;

const fn session_state(state: &mut AppState) -> &mut SessionState {
    &mut state.session
}

const fn todo_state(state: &mut AppState) -> &mut TodoState {
    &mut state.todos
}

fn session_action(action: AppAction) -> Option<SessionAction> {
    match action {
        AppAction::Session(action) => Some(action),
        AppAction::Todos(_) => None,
    }
}

fn todo_action(action: AppAction) -> Option<TodoAction> {
    match action {
        AppAction::Todos(action) => Some(action),
        AppAction::Session(_) => None,
    }
}

fn session_env<I, D>(env: &AppEnvironment<I, D>) -> &SessionEnvironment<I>
where
    I: IdentityProvider + Clone,
    D: DocumentStore + Clone,
{
    &env.session
}

fn todo_env<I, D>(env: &AppEnvironment<I, D>) -> &TodoEnvironment<D>
where
    I: IdentityProvider + Clone,
    D: DocumentStore + Clone,
{
    &env.todos
}

/// Runs both adapters and keeps the live query on the current identity
pub struct AppReducer<I, D>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentStore + Clone + 'static,
{
    session: ScopedSession<I, D>,
    todos: ScopedTodos<I, D>,
}

impl<I, D> AppReducer<I, D>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentStore + Clone + 'static,
{
    /// Creates the composed reducer
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: scope_reducer(
                SessionReducer::new(),
                session_state,
                session_action,
                AppAction::Session,
                session_env::<I, D>,
            ),
            todos: scope_reducer(
                TodoReducer::new(),
                todo_state,
                todo_action,
                AppAction::Todos,
                todo_env::<I, D>,
            ),
        }
    }

    /// Subscribe or unsubscribe when the identity and the query owner disagree
    fn follow_identity(
        &self,
        state: &mut AppState,
        env: &AppEnvironment<I, D>,
    ) -> SmallVec<[Effect<AppAction>; 4]> {
        let identity = state.session.uid().cloned();
        if identity == state.todos.owner {
            return SmallVec::new();
        }

        let action = match identity {
            Some(owner) => {
                tracing::info!(%owner, "identity changed, resubscribing");
                TodoAction::Subscribe { owner }
            },
            None => {
                tracing::info!("identity cleared, unsubscribing");
                TodoAction::Unsubscribe
            },
        };
        self.todos.reduce(state, AppAction::Todos(action), env)
    }
}

impl<I, D> Default for AppReducer<I, D>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentStore + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, D> Reducer for AppReducer<I, D>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentStore + Clone + 'static,
{
    type State = AppState;
    type Action = AppAction;
    type Environment = AppEnvironment<I, D>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut effects = match action {
            AppAction::Session(_) => self.session.reduce(state, action, env),
            AppAction::Todos(_) => self.todos.reduce(state, action, env),
        };
        effects.extend(self.follow_identity(state, env));
        effects
    }
}

//! In-memory todo collection with live queries.

use super::{DOCUMENT_ID_LEN, random_id};
use crate::error::{DocumentError, DocumentResult};
use crate::model::{NewTodo, TodoId, TodoItem, TodoPatch, UserId};
use crate::providers::{DocumentStore, TodoStream};
use livetodo_core::environment::{Clock, SystemClock};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Default)]
struct Collection {
    // Insertion order doubles as creation order
    items: Vec<TodoItem>,
    write_failure: Option<DocumentError>,
    query_failure: Option<DocumentError>,
}

struct Inner {
    collection: Mutex<Collection>,
    version: watch::Sender<u64>,
    clock: Arc<dyn Clock>,
}

/// Document store holding todos in a vector.
///
/// Every accepted write bumps a version counter; live queries re-run when it
/// changes and emit only when their result differs from the last one sent.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

impl MemoryDocumentStore {
    /// Empty store stamping documents with the wall clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty store stamping documents with `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                collection: Mutex::new(Collection::default()),
                version: watch::channel(0).0,
                clock,
            }),
        }
    }

    fn collection(&self) -> MutexGuard<'_, Collection> {
        self.inner
            .collection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects every following write with `error`; `None` lets writes through again
    pub fn fail_writes_with(&self, error: Option<DocumentError>) {
        self.collection().write_failure = error;
    }

    /// Makes live queries report `error` on their next evaluation
    pub fn fail_queries_with(&self, error: Option<DocumentError>) {
        self.collection().query_failure = error;
        self.touch();
    }

    /// Everything `owner` would see in a snapshot
    #[must_use]
    pub fn todos_of(&self, owner: &UserId) -> Vec<TodoItem> {
        query(&self.collection(), owner)
    }

    /// Total number of documents across all owners
    #[must_use]
    pub fn len(&self) -> usize {
        self.collection().items.len()
    }

    /// Whether the store holds no documents
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn touch(&self) {
        self.inner.version.send_modify(|version| *version += 1);
    }

    fn check_writable(collection: &Collection) -> DocumentResult<()> {
        collection.write_failure.clone().map_or(Ok(()), Err)
    }

    fn insert(&self, todo: NewTodo) -> DocumentResult<TodoItem> {
        let item = {
            let mut collection = self.collection();
            Self::check_writable(&collection)?;
            let stored = TodoItem {
                id: TodoId::new(random_id(DOCUMENT_ID_LEN)),
                text: todo.text,
                completed: todo.completed,
                user_id: todo.user_id,
                created_at: Some(self.inner.clock.now()),
            };
            collection.items.push(stored.clone());
            stored
        };
        self.touch();

        // The timestamp only becomes visible through the live query
        Ok(TodoItem {
            created_at: None,
            ..item
        })
    }

    fn modify(&self, id: &TodoId, patch: &TodoPatch) -> DocumentResult<()> {
        {
            let mut collection = self.collection();
            Self::check_writable(&collection)?;
            let item = collection
                .items
                .iter_mut()
                .find(|item| &item.id == id)
                .ok_or_else(|| DocumentError::NotFound(id.clone()))?;
            item.apply(patch);
        }
        self.touch();
        Ok(())
    }

    fn remove(&self, id: &TodoId) -> DocumentResult<()> {
        {
            let mut collection = self.collection();
            Self::check_writable(&collection)?;
            collection.items.retain(|item| &item.id != id);
        }
        self.touch();
        Ok(())
    }

    fn evaluate(&self, owner: &UserId) -> DocumentResult<Vec<TodoItem>> {
        let collection = self.collection();
        match &collection.query_failure {
            Some(error) => Err(error.clone()),
            None => Ok(query(&collection, owner)),
        }
    }
}

fn query(collection: &Collection, owner: &UserId) -> Vec<TodoItem> {
    collection
        .items
        .iter()
        .filter(|item| &item.user_id == owner)
        .cloned()
        .collect()
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDocumentStore")
            .field("documents", &self.len())
            .finish_non_exhaustive()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn watch_todos(&self, owner: &UserId) -> TodoStream {
        let store = self.clone();
        let owner = owner.clone();
        let mut version = self.inner.version.subscribe();

        Box::pin(async_stream::stream! {
            let mut last: Option<Vec<TodoItem>> = None;
            loop {
                let _ = version.borrow_and_update();
                match store.evaluate(&owner) {
                    Ok(todos) => {
                        if last.as_ref() != Some(&todos) {
                            last = Some(todos.clone());
                            yield Ok(todos);
                        }
                    },
                    Err(error) => {
                        last = None;
                        yield Err(error);
                    },
                }
                if version.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    async fn create_todo(&self, todo: NewTodo) -> DocumentResult<TodoItem> {
        self.insert(todo)
    }

    async fn update_todo(&self, id: &TodoId, patch: &TodoPatch) -> DocumentResult<()> {
        self.modify(id, patch)
    }

    async fn delete_todo(&self, id: &TodoId) -> DocumentResult<()> {
        self.remove(id)
    }
}

//! External service interfaces.
//!
//! The adapters depend only on these traits; the runtime is handed a concrete
//! backend ([`crate::memory`] or [`crate::firebase`]).
//!
//! Live sources (session changes, todo query results) are plain streams. The
//! todo adapter runs them as cancellable effects, so dropping the stream is
//! how a subscription is released.

use crate::error::{AuthResult, DocumentResult};
use crate::model::{NewTodo, Session, TodoId, TodoItem, TodoPatch, UserId};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::watch;

/// Stream of session states; `None` means signed out.
pub type SessionStream = Pin<Box<dyn Stream<Item = Option<Session>> + Send>>;

/// Stream of full query results for one owner.
pub type TodoStream = Pin<Box<dyn Stream<Item = DocumentResult<Vec<TodoItem>>> + Send>>;

/// Email/password identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Creates an account and signs it in.
    ///
    /// # Errors
    ///
    /// - `EmailAlreadyInUse`, `InvalidEmail`, `WeakPassword`, `OperationNotAllowed`
    /// - `Other` for transport failures
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AuthResult<Session>> + Send;

    /// Verifies credentials and signs the account in.
    ///
    /// # Errors
    ///
    /// - `UserNotFound`, `WrongPassword`, `UserDisabled`, `TooManyRequests`, `InvalidEmail`
    /// - `Other` for transport failures
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AuthResult<Session>> + Send;

    /// Ends the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider refuses or cannot be reached.
    fn sign_out(&self) -> impl Future<Output = AuthResult<()>> + Send;

    /// Current session followed by every change.
    ///
    /// The first item is emitted immediately.
    fn watch_session(&self) -> SessionStream;
}

/// Document database holding todo items.
pub trait DocumentStore: Send + Sync {
    /// Live query for the todos owned by `owner`.
    ///
    /// Emits the full result set once immediately and again after every
    /// change. An `Err` item reports a failed query; the stream may continue.
    fn watch_todos(&self, owner: &UserId) -> TodoStream;

    /// Writes a new todo and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected or the store is unreachable.
    fn create_todo(&self, todo: NewTodo) -> impl Future<Output = DocumentResult<TodoItem>> + Send;

    /// Writes the fields present in `patch`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the document does not exist.
    fn update_todo(
        &self,
        id: &TodoId,
        patch: &TodoPatch,
    ) -> impl Future<Output = DocumentResult<()>> + Send;

    /// Removes a todo. Deleting a missing document succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected or the store is unreachable.
    fn delete_todo(&self, id: &TodoId) -> impl Future<Output = DocumentResult<()>> + Send;
}

/// Turns a watch receiver into a stream of its current value and every change.
pub(crate) fn watch_stream<T>(mut rx: watch::Receiver<T>) -> Pin<Box<dyn Stream<Item = T> + Send>>
where
    T: Clone + Send + Sync + 'static,
{
    Box::pin(async_stream::stream! {
        loop {
            let current = rx.borrow_and_update().clone();
            yield current;
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}

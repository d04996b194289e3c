//! # livetodo
//!
//! A personal todo list that stays in sync across sessions. Identity and
//! storage are delegated to hosted services; this crate holds the client
//! state layer, the adapters that talk to those services and a terminal view.
//!
//! ## Architecture
//!
//! Two state slices (session and todos) are driven by two reducers that are
//! scoped into one [`AppReducer`] and run by a `livetodo_runtime::Store`:
//!
//! ```text
//! input → AppAction → AppReducer → (AppState, Effects) → provider calls → more actions
//! ```
//!
//! Provider calls, live subscriptions and notifications are all effects. The
//! live todo query is a cancellable stream keyed by [`todos::TODOS_LIVE`];
//! [`AppReducer`] re-keys it whenever the signed-in identity changes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use livetodo::*;
//!
//! let env = AppEnvironment::new(
//!     MemoryIdentityProvider::new(),
//!     MemoryDocumentStore::new(),
//!     NotificationCenter::new(),
//! );
//! let store = livetodo_store(env);
//! store.send(SessionAction::Start.into()).await?;
//! store.send(SessionAction::SignUp { email, password }.into()).await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod app;
pub mod commands;
pub mod config;
pub mod environment;
pub mod error;
pub mod firebase;
pub mod memory;
pub mod model;
pub mod notifications;
pub mod providers;
pub mod session;
pub mod todos;
pub mod view;

pub use app::{AppAction, AppReducer, AppState};
pub use config::{AppConfig, Backend};
pub use environment::AppEnvironment;
pub use error::{AuthError, ConfigError, DocumentError};
pub use memory::{MemoryDocumentStore, MemoryIdentityProvider};
pub use model::{Password, Session, TodoId, TodoItem, TodoPatch, UserId};
pub use notifications::{Notification, NotificationCenter, NotificationKind};
pub use providers::{DocumentStore, IdentityProvider};
pub use session::{SessionAction, SessionState};
pub use todos::{TodoAction, TodoState};

use livetodo_runtime::Store;

/// The runtime store for the whole app
pub type LiveTodoStore<I, D> = Store<AppState, AppAction, AppEnvironment<I, D>, AppReducer<I, D>>;

/// Creates a store over `env`, starting from a signed-out, restoring state
#[must_use]
pub fn livetodo_store<I, D>(env: AppEnvironment<I, D>) -> LiveTodoStore<I, D>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentStore + Clone + 'static,
{
    Store::new(AppState::default(), AppReducer::new(), env)
}

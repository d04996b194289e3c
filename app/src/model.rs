//! Domain types shared by the stores, adapters and backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity assigned by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wraps a provider-assigned uid
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Returns the raw uid
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Provider uid
    pub uid: UserId,
    /// Email the account was registered with
    pub email: String,
}

impl Session {
    /// Creates a session
    #[must_use]
    pub fn new(uid: UserId, email: impl Into<String>) -> Self {
        Self {
            uid,
            email: email.into(),
        }
    }
}

/// A password on its way to the identity provider. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Wraps a plain-text password
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// The plain-text password, for the provider call only
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Identifier assigned by the document store on creation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TodoId(String);

impl TodoId {
    /// Wraps a store-assigned document id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single todo item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Store-assigned identifier, immutable
    pub id: TodoId,
    /// Description
    pub text: String,
    /// Whether the todo is done
    pub completed: bool,
    /// Owner
    pub user_id: UserId,
    /// Server timestamp; `None` until the store has confirmed the write
    pub created_at: Option<DateTime<Utc>>,
}

impl TodoItem {
    /// Applies the fields present in `patch`.
    pub fn apply(&mut self, patch: &TodoPatch) {
        if let Some(text) = &patch.text {
            self.text.clone_from(text);
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }
}

/// Fields to write for a new todo. The store assigns id and timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTodo {
    /// Description
    pub text: String,
    /// Initial completion flag, always `false` from the adapter
    pub completed: bool,
    /// Owner
    pub user_id: UserId,
}

impl NewTodo {
    /// An open todo owned by `user_id`
    #[must_use]
    pub fn new(text: impl Into<String>, user_id: UserId) -> Self {
        Self {
            text: text.into(),
            completed: false,
            user_id,
        }
    }
}

/// Partial update: `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoPatch {
    /// New description
    pub text: Option<String>,
    /// New completion flag
    pub completed: Option<bool>,
}

impl TodoPatch {
    /// Replace the text only
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            completed: None,
        }
    }

    /// Set the completion flag only
    #[must_use]
    pub const fn completed(completed: bool) -> Self {
        Self {
            text: None,
            completed: Some(completed),
        }
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none()
    }
}

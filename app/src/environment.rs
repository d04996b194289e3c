//! Environments injected into the adapters.
//!
//! Each adapter gets only what it needs; [`AppEnvironment`] bundles both so a
//! single store can run them side by side.

use crate::notifications::NotificationCenter;
use crate::providers::{DocumentStore, IdentityProvider};

/// Dependencies of the auth adapter
#[derive(Clone)]
pub struct SessionEnvironment<I>
where
    I: IdentityProvider + Clone,
{
    /// Identity provider
    pub identity: I,
    /// Toast channel
    pub notifications: NotificationCenter,
}

impl<I> SessionEnvironment<I>
where
    I: IdentityProvider + Clone,
{
    /// Creates the environment
    #[must_use]
    pub const fn new(identity: I, notifications: NotificationCenter) -> Self {
        Self {
            identity,
            notifications,
        }
    }
}

/// Dependencies of the todo adapter
#[derive(Clone)]
pub struct TodoEnvironment<D>
where
    D: DocumentStore + Clone,
{
    /// Document database
    pub documents: D,
    /// Toast channel
    pub notifications: NotificationCenter,
}

impl<D> TodoEnvironment<D>
where
    D: DocumentStore + Clone,
{
    /// Creates the environment
    #[must_use]
    pub const fn new(documents: D, notifications: NotificationCenter) -> Self {
        Self {
            documents,
            notifications,
        }
    }
}

/// Everything the composed app needs
#[derive(Clone)]
pub struct AppEnvironment<I, D>
where
    I: IdentityProvider + Clone,
    D: DocumentStore + Clone,
{
    /// Auth adapter dependencies
    pub session: SessionEnvironment<I>,
    /// Todo adapter dependencies
    pub todos: TodoEnvironment<D>,
}

impl<I, D> AppEnvironment<I, D>
where
    I: IdentityProvider + Clone,
    D: DocumentStore + Clone,
{
    /// Both adapters share one notification center
    #[must_use]
    pub fn new(identity: I, documents: D, notifications: NotificationCenter) -> Self {
        Self {
            session: SessionEnvironment::new(identity, notifications.clone()),
            todos: TodoEnvironment::new(documents, notifications),
        }
    }

    /// The shared notification center
    #[must_use]
    pub const fn notifications(&self) -> &NotificationCenter {
        &self.session.notifications
    }
}

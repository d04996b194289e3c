//! Transient user notifications ("toasts").
//!
//! Adapters publish [`Notification`]s through a [`NotificationCenter`]; the
//! view subscribes and decides how long to keep each one on screen.

use crate::error::ErrorDescription;
use livetodo_core::effect::Effect;
use std::time::Duration;
use tokio::sync::broadcast;

/// Success or error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Operation succeeded
    Success,
    /// Operation failed
    Error,
}

/// A short-lived message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Success or error
    pub kind: NotificationKind,
    /// Heading, empty for success messages
    pub title: String,
    /// Body text
    pub message: String,
    /// Glyph shown before the text
    pub icon: String,
    /// How long the notification stays visible
    pub auto_close: Duration,
}

/// Broadcast hub for notifications
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    sender: broadcast::Sender<Notification>,
    success_auto_close: Duration,
    error_auto_close: Duration,
}

impl NotificationCenter {
    /// Default display time for success notifications
    pub const SUCCESS_AUTO_CLOSE: Duration = Duration::from_millis(3000);
    /// Default display time for error notifications
    pub const ERROR_AUTO_CLOSE: Duration = Duration::from_millis(5000);

    /// Creates a center with the default display times
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            sender,
            success_auto_close: Self::SUCCESS_AUTO_CLOSE,
            error_auto_close: Self::ERROR_AUTO_CLOSE,
        }
    }

    /// Overrides the display times
    #[must_use]
    pub const fn with_auto_close(mut self, success: Duration, error: Duration) -> Self {
        self.success_auto_close = success;
        self.error_auto_close = error;
        self
    }

    /// Receives every notification published after this call
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Builds a success notification
    #[must_use]
    pub fn success(&self, message: impl Into<String>) -> Notification {
        Notification {
            kind: NotificationKind::Success,
            title: String::new(),
            message: message.into(),
            icon: "✅".to_string(),
            auto_close: self.success_auto_close,
        }
    }

    /// Builds an error notification
    #[must_use]
    pub fn error(&self, description: ErrorDescription) -> Notification {
        Notification {
            kind: NotificationKind::Error,
            title: description.title.to_string(),
            message: description.message.to_string(),
            icon: description.icon.to_string(),
            auto_close: self.error_auto_close,
        }
    }

    /// Builds an error notification with a free-form message
    #[must_use]
    pub fn failure(&self, message: impl Into<String>) -> Notification {
        Notification {
            kind: NotificationKind::Error,
            title: "Error".to_string(),
            message: message.into(),
            icon: "❌".to_string(),
            auto_close: self.error_auto_close,
        }
    }

    /// Sends to all current subscribers; dropped when nobody listens
    pub fn publish(&self, notification: Notification) {
        tracing::debug!(kind = ?notification.kind, message = %notification.message, "notification");
        let _ = self.sender.send(notification);
    }

    /// An effect that publishes `notification` and produces no action
    #[must_use]
    pub fn notify<A: Send + 'static>(&self, notification: Notification) -> Effect<A> {
        let center = self.clone();
        Effect::future(async move {
            center.publish(notification);
            None
        })
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;
    use crate::error::AuthError;

    #[test]
    fn test_success_uses_short_auto_close() {
        let center = NotificationCenter::new();
        let note = center.success("done");
        assert_eq!(note.kind, NotificationKind::Success);
        assert_eq!(note.auto_close, Duration::from_secs(3));
    }

    #[test]
    fn test_error_carries_description() {
        let center = NotificationCenter::new()
            .with_auto_close(Duration::from_millis(10), Duration::from_millis(20));
        let note = center.error(AuthError::UserNotFound.describe());
        assert_eq!(note.title, "Account Not Found");
        assert_eq!(note.icon, "🔍");
        assert_eq!(note.auto_close, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let center = NotificationCenter::new();
        let mut rx = center.subscribe();
        center.publish(center.failure("boom"));
        let received = rx.recv().await.unwrap_or_else(|_| center.success("missing"));
        assert_eq!(received.message, "boom");
    }
}

//! Terminal rendering of the two stores.
//!
//! Pure presentation: a [`Screen`] is derived from [`AppState`] and rendered
//! to text. Nothing here writes state.

use crate::app::AppState;
use crate::model::TodoItem;
use crate::notifications::{Notification, NotificationKind};
use std::fmt::Write as _;
use std::time::Instant;

const APP_TITLE: &str = "Todo App";

/// Which credentials form is showing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormMode {
    /// Existing account
    #[default]
    LogIn,
    /// New account
    SignUp,
}

/// What the user is looking at
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen<'a> {
    /// Waiting for the provider to report the saved session
    Loading,
    /// Credentials form
    SignIn {
        /// Log in or sign up
        mode: FormMode,
        /// A request is in flight
        busy: bool,
        /// Last auth failure
        error: Option<&'a str>,
    },
    /// The signed-in user's list
    Todos {
        /// Account email
        email: &'a str,
        /// Waiting for the first snapshot
        loading: bool,
        /// Items in display order
        todos: &'a [TodoItem],
        /// Last todo failure
        error: Option<&'a str>,
    },
}

impl<'a> Screen<'a> {
    /// Picks the screen for the current state
    #[must_use]
    pub fn of(state: &'a AppState, mode: FormMode) -> Self {
        let session = &state.session;
        if session.restoring {
            return Self::Loading;
        }
        match &session.session {
            None => Self::SignIn {
                mode,
                busy: session.loading,
                error: session.error.as_deref(),
            },
            Some(current) => Self::Todos {
                email: &current.email,
                loading: state.todos.loading,
                todos: &state.todos.todos,
                error: state.todos.error.as_deref(),
            },
        }
    }

    /// Renders the screen followed by any notifications
    #[must_use]
    pub fn render(&self, notifications: &[Notification]) -> String {
        let mut out = String::new();
        match self {
            Self::Loading => {
                let _ = writeln!(out, "{APP_TITLE}");
                let _ = writeln!(out, "Loading...");
            },
            Self::SignIn { mode, busy, error } => render_sign_in(&mut out, *mode, *busy, *error),
            Self::Todos {
                email,
                loading,
                todos,
                error,
            } => render_todos(&mut out, email, *loading, todos, *error),
        }

        for notification in notifications {
            let _ = writeln!(out, "{}", render_notification(notification));
        }
        out
    }
}

fn render_sign_in(out: &mut String, mode: FormMode, busy: bool, error: Option<&str>) {
    let _ = writeln!(out, "{APP_TITLE}");
    match mode {
        FormMode::LogIn => {
            let _ = writeln!(out, "Log in to your account");
            let _ = writeln!(out, "  login <email> <password>");
            let _ = writeln!(out, "No account yet? Type `signup` to create one.");
        },
        FormMode::SignUp => {
            let _ = writeln!(out, "Create an account");
            let _ = writeln!(out, "  signup <email> <password>");
            let _ = writeln!(out, "Already registered? Type `login` to sign in.");
        },
    }
    if busy {
        let _ = writeln!(out, "Please wait...");
    }
    if let Some(error) = error {
        let _ = writeln!(out, "! {error}");
    }
}

fn render_todos(out: &mut String, email: &str, loading: bool, todos: &[TodoItem], error: Option<&str>) {
    let _ = writeln!(out, "{APP_TITLE} ({email})");
    if loading {
        let _ = writeln!(out, "Loading todos...");
    } else if todos.is_empty() {
        let _ = writeln!(out, "No todos yet. Add one with `add <text>`.");
    } else {
        for (index, todo) in todos.iter().enumerate() {
            let _ = writeln!(out, "{:>3}. {}", index + 1, render_item(todo));
        }
        let done = todos.iter().filter(|todo| todo.completed).count();
        let _ = writeln!(out, "{done} of {} completed", todos.len());
    }
    if let Some(error) = error {
        let _ = writeln!(out, "! {error}");
    }
}

/// One list row: checkbox and text, struck through when completed
#[must_use]
pub fn render_item(todo: &TodoItem) -> String {
    if todo.completed {
        format!("[x] {}", strike(&todo.text))
    } else {
        format!("[ ] {}", todo.text)
    }
}

fn strike(text: &str) -> String {
    text.chars().flat_map(|c| [c, '\u{0336}']).collect()
}

/// One notification line
#[must_use]
pub fn render_notification(notification: &Notification) -> String {
    match notification.kind {
        NotificationKind::Success => format!("{} {}", notification.icon, notification.message),
        NotificationKind::Error => format!(
            "{} {}: {}",
            notification.icon, notification.title, notification.message
        ),
    }
}

/// Notifications currently on screen, each until its auto-close elapses
#[derive(Debug, Default)]
pub struct Toasts {
    shown: Vec<(Notification, Instant)>,
}

impl Toasts {
    /// Empty
    #[must_use]
    pub const fn new() -> Self {
        Self { shown: Vec::new() }
    }

    /// Shows `notification` from `now`
    pub fn push(&mut self, notification: Notification, now: Instant) {
        self.shown.push((notification, now));
    }

    /// Drops expired notifications and returns the rest
    pub fn active(&mut self, now: Instant) -> Vec<Notification> {
        self.shown
            .retain(|(notification, since)| now.duration_since(*since) < notification.auto_close);
        self.shown.iter().map(|(notification, _)| notification.clone()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;
    use crate::model::{Session, TodoId, UserId};
    use crate::notifications::NotificationCenter;
    use std::time::Duration;

    fn todo(text: &str, completed: bool) -> TodoItem {
        TodoItem {
            id: TodoId::new(text),
            text: text.to_string(),
            completed,
            user_id: UserId::new("alice"),
            created_at: None,
        }
    }

    fn signed_in() -> AppState {
        let mut state = AppState::default();
        state.session.restoring = false;
        state.session.session = Some(Session::new(UserId::new("alice"), "alice@example.com"));
        state
    }

    #[test]
    fn test_restoring_shows_loading() {
        let state = AppState::default();
        assert_eq!(Screen::of(&state, FormMode::LogIn), Screen::Loading);
    }

    #[test]
    fn test_no_session_shows_form_with_error() {
        let mut state = AppState::default();
        state.session.restoring = false;
        state.session.error = Some("No account found".to_string());

        let screen = Screen::of(&state, FormMode::SignUp);
        let text = screen.render(&[]);
        assert!(text.contains("Create an account"));
        assert!(text.contains("! No account found"));
    }

    #[test]
    fn test_todo_list_rendering() {
        let mut state = signed_in();
        state.todos.todos = vec![todo("milk", false), todo("eggs", true)];

        let text = Screen::of(&state, FormMode::LogIn).render(&[]);
        assert!(text.contains("alice@example.com"));
        assert!(text.contains("  1. [ ] milk"));
        assert!(text.contains("  2. [x] e\u{336}g\u{336}g\u{336}s\u{336}"));
        assert!(text.contains("1 of 2 completed"));
    }

    #[test]
    fn test_loading_and_empty_placeholders() {
        let mut state = signed_in();
        state.todos.loading = true;
        assert!(Screen::of(&state, FormMode::LogIn).render(&[]).contains("Loading todos..."));

        state.todos.loading = false;
        assert!(Screen::of(&state, FormMode::LogIn).render(&[]).contains("No todos yet"));
    }

    #[test]
    fn test_notifications_follow_the_screen() {
        let center = NotificationCenter::new();
        let text = Screen::Loading.render(&[center.success("Saved")]);
        assert!(text.ends_with("✅ Saved\n"));

        let error = center.failure("denied");
        assert_eq!(render_notification(&error), "❌ Error: denied");
    }

    #[test]
    fn test_toasts_expire() {
        let center = NotificationCenter::new()
            .with_auto_close(Duration::from_secs(3), Duration::from_secs(5));
        let start = Instant::now();
        let mut toasts = Toasts::new();
        toasts.push(center.success("hi"), start);
        toasts.push(center.failure("oops"), start);

        assert_eq!(toasts.active(start + Duration::from_secs(1)).len(), 2);
        let left = toasts.active(start + Duration::from_secs(4));
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].message, "oops");
        assert!(toasts.active(start + Duration::from_secs(6)).is_empty());
    }
}

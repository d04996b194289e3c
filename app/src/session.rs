//! Session store and auth adapter.
//!
//! [`SessionReducer`] wraps the identity provider: signup, login and logout
//! requests become effects, their outcomes come back as actions, and every
//! failure is turned into an error message plus an error notification. The
//! provider's session stream, started by [`SessionAction::Start`], is the only
//! source of truth for whether a session is active.

use crate::environment::SessionEnvironment;
use crate::error::AuthError;
use crate::model::{Password, Session};
use crate::providers::IdentityProvider;
use futures::StreamExt;
use livetodo_core::effect::{Effect, EffectId};
use livetodo_core::reducer::Reducer;
use livetodo_core::{SmallVec, smallvec};
use std::marker::PhantomData;

/// Cancellation key of the session watch
pub const SESSION_WATCH: EffectId = EffectId::new("session.watch");

/// Shown after a successful signup
pub const SIGNED_UP_MESSAGE: &str = "Account created successfully! Welcome to Todo App!";
/// Shown after a successful login
pub const LOGGED_IN_MESSAGE: &str = "Welcome back! You have successfully logged in.";
/// Shown after a successful logout
pub const LOGGED_OUT_MESSAGE: &str = "You have been successfully logged out. See you soon!";

/// Session store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    /// Current identity, if signed in
    pub session: Option<Session>,
    /// A signup or login request is in flight
    pub loading: bool,
    /// No session state has been received from the provider yet
    pub restoring: bool,
    /// User-facing message of the last failure
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session: None,
            loading: false,
            restoring: true,
            error: None,
        }
    }
}

impl SessionState {
    /// The current user's id
    #[must_use]
    pub fn uid(&self) -> Option<&crate::model::UserId> {
        self.session.as_ref().map(|session| &session.uid)
    }
}

/// Requests to and results from the identity provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Start following the provider's session state
    Start,
    /// Create an account
    SignUp {
        /// Account email
        email: String,
        /// Account password
        password: Password,
    },
    /// Sign in with existing credentials
    LogIn {
        /// Account email
        email: String,
        /// Account password
        password: Password,
    },
    /// End the session
    LogOut,
    /// Account created and signed in
    SignedUp {
        /// The new session
        session: Session,
    },
    /// Credentials accepted
    LoggedIn {
        /// The new session
        session: Session,
    },
    /// Session ended
    LoggedOut,
    /// Any provider failure
    AuthFailed {
        /// What went wrong
        error: AuthError,
    },
    /// The provider reported a session change
    SessionChanged {
        /// The new session, `None` when signed out
        session: Option<Session>,
    },
}

/// Auth adapter
#[derive(Debug, Clone)]
pub struct SessionReducer<I> {
    _provider: PhantomData<fn() -> I>,
}

impl<I> SessionReducer<I> {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _provider: PhantomData,
        }
    }
}

impl<I> Default for SessionReducer<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> SessionReducer<I>
where
    I: IdentityProvider + Clone + 'static,
{
    fn established(
        state: &mut SessionState,
        session: Session,
        message: &str,
        env: &SessionEnvironment<I>,
    ) -> SmallVec<[Effect<SessionAction>; 4]> {
        tracing::info!(uid = %session.uid, "signed in");
        state.session = Some(session);
        state.loading = false;
        state.error = None;
        smallvec![env.notifications.notify(env.notifications.success(message))]
    }
}

impl<I> Reducer for SessionReducer<I>
where
    I: IdentityProvider + Clone + 'static,
{
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment<I>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            SessionAction::Start => {
                let changes = env
                    .identity
                    .watch_session()
                    .map(|session| SessionAction::SessionChanged { session });
                smallvec![Effect::Stream(Box::pin(changes)).cancellable(SESSION_WATCH)]
            },

            SessionAction::SignUp { email, password } => {
                state.loading = true;
                state.error = None;

                let identity = env.identity.clone();
                smallvec![Effect::future(async move {
                    Some(match identity.sign_up(&email, password.expose()).await {
                        Ok(session) => SessionAction::SignedUp { session },
                        Err(error) => SessionAction::AuthFailed { error },
                    })
                })]
            },

            SessionAction::LogIn { email, password } => {
                state.loading = true;
                state.error = None;

                let identity = env.identity.clone();
                smallvec![Effect::future(async move {
                    Some(match identity.sign_in(&email, password.expose()).await {
                        Ok(session) => SessionAction::LoggedIn { session },
                        Err(error) => SessionAction::AuthFailed { error },
                    })
                })]
            },

            SessionAction::LogOut => {
                let identity = env.identity.clone();
                smallvec![Effect::future(async move {
                    Some(match identity.sign_out().await {
                        Ok(()) => SessionAction::LoggedOut,
                        Err(error) => SessionAction::AuthFailed { error },
                    })
                })]
            },

            SessionAction::SignedUp { session } => {
                Self::established(state, session, SIGNED_UP_MESSAGE, env)
            },

            SessionAction::LoggedIn { session } => {
                Self::established(state, session, LOGGED_IN_MESSAGE, env)
            },

            SessionAction::LoggedOut => {
                state.session = None;
                state.loading = false;
                state.error = None;
                smallvec![env.notifications.notify(env.notifications.success(LOGGED_OUT_MESSAGE))]
            },

            SessionAction::AuthFailed { error } => {
                tracing::warn!(code = error.code(), %error, "auth request failed");
                let description = error.describe();
                state.loading = false;
                state.error = Some(description.message.to_string());
                smallvec![env.notifications.notify(env.notifications.error(description))]
            },

            SessionAction::SessionChanged { session } => {
                tracing::debug!(signed_in = session.is_some(), "session changed");
                state.session = session;
                state.loading = false;
                state.restoring = false;
                smallvec![Effect::None]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;
    use crate::memory::MemoryIdentityProvider;
    use crate::model::UserId;
    use crate::notifications::{NotificationCenter, NotificationKind};
    use livetodo_testing::{ReducerTest, assertions, helpers::resolve_futures};

    type Test = ReducerTest<
        SessionReducer<MemoryIdentityProvider>,
        SessionState,
        SessionAction,
        SessionEnvironment<MemoryIdentityProvider>,
    >;

    fn env() -> SessionEnvironment<MemoryIdentityProvider> {
        SessionEnvironment::new(MemoryIdentityProvider::new(), NotificationCenter::new())
    }

    fn test() -> Test {
        ReducerTest::new(SessionReducer::new())
            .with_env(env())
            .given_state(SessionState::default())
    }

    fn alice() -> Session {
        Session::new(UserId::new("uid-alice"), "alice@example.com")
    }

    #[test]
    fn test_start_opens_cancellable_watch() {
        test()
            .when_action(SessionAction::Start)
            .then_state(|state| assert!(state.restoring))
            .then_effects(|effects| assertions::assert_starts_stream(effects, &SESSION_WATCH))
            .run();
    }

    #[test]
    fn test_sign_up_sets_loading_and_clears_error() {
        test()
            .given_action(SessionAction::AuthFailed {
                error: AuthError::WeakPassword,
            })
            .when_action(SessionAction::SignUp {
                email: "a@example.com".to_string(),
                password: Password::new("secret1"),
            })
            .then_state(|state| {
                assert!(state.loading);
                assert_eq!(state.error, None);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_signed_up_stores_session() {
        test()
            .when_action(SessionAction::SignedUp { session: alice() })
            .then_state(|state| {
                assert_eq!(state.session, Some(alice()));
                assert!(!state.loading);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn test_auth_failed_records_table_message_and_keeps_session() {
        test()
            .given_action(SessionAction::LoggedIn { session: alice() })
            .when_action(SessionAction::AuthFailed {
                error: AuthError::from_code("auth/wrong-password"),
            })
            .then_state(|state| {
                assert_eq!(state.session, Some(alice()));
                assert!(!state.loading);
                assert_eq!(
                    state.error.as_deref(),
                    Some("The password you entered is incorrect. Please try again or use \"Forgot Password\".")
                );
            })
            .run();
    }

    #[test]
    fn test_unknown_failure_uses_generic_message() {
        test()
            .when_action(SessionAction::AuthFailed {
                error: AuthError::other("auth/network-request-failed", "offline"),
            })
            .then_state(|state| {
                assert_eq!(state.error.as_deref(), Some("An error occurred. Please try again."));
            })
            .run();
    }

    #[test]
    fn test_logged_out_clears_session() {
        test()
            .given_action(SessionAction::LoggedIn { session: alice() })
            .when_action(SessionAction::LoggedOut)
            .then_state(|state| assert_eq!(state.session, None))
            .run();
    }

    #[test]
    fn test_session_changed_ends_restoring() {
        test()
            .when_action(SessionAction::SessionChanged {
                session: Some(alice()),
            })
            .then_state(|state| {
                assert!(!state.restoring);
                assert_eq!(state.uid(), Some(&UserId::new("uid-alice")));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn test_sign_up_effect_resolves_to_signed_up() {
        let env = env();
        let mut state = SessionState::default();
        let effects = SessionReducer::new().reduce(
            &mut state,
            SessionAction::SignUp {
                email: "bob@example.com".to_string(),
                password: Password::new("secret1"),
            },
            &env,
        );
        let actions = resolve_futures(effects.into_vec()).await;
        assert!(matches!(
            actions.as_slice(),
            [SessionAction::SignedUp { session }] if session.email == "bob@example.com"
        ));
    }

    #[tokio::test]
    async fn test_failure_publishes_error_notification() {
        let env = env();
        let mut notes = env.notifications.subscribe();
        let mut state = SessionState::default();
        let effects = SessionReducer::new().reduce(
            &mut state,
            SessionAction::AuthFailed {
                error: AuthError::TooManyRequests,
            },
            &env,
        );
        let _ = resolve_futures(effects.into_vec()).await;

        let note = notes.try_recv();
        assert!(matches!(
            note,
            Ok(ref n) if n.kind == NotificationKind::Error && n.title == "Too Many Attempts"
        ));
    }
}

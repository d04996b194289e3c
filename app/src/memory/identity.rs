//! In-memory email/password identity provider.

use super::{USER_ID_LEN, random_id};
use crate::error::{AuthError, AuthResult};
use crate::model::{Session, UserId};
use crate::providers::{IdentityProvider, SessionStream, watch_stream};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Failed sign-ins for one email before further attempts are refused
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
struct Account {
    uid: UserId,
    email: String,
    password: String,
    disabled: bool,
}

#[derive(Debug, Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    failed_attempts: HashMap<String, u32>,
    sign_out_failure: Option<AuthError>,
}

#[derive(Debug)]
struct Inner {
    accounts: Mutex<Accounts>,
    session: watch::Sender<Option<Session>>,
    password_accounts_enabled: AtomicBool,
}

/// Identity provider backed by a map of accounts.
///
/// Clones share accounts and the signed-in session.
#[derive(Debug, Clone)]
pub struct MemoryIdentityProvider {
    inner: Arc<Inner>,
}

impl MemoryIdentityProvider {
    /// Creates a provider with no accounts and nobody signed in
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                accounts: Mutex::new(Accounts::default()),
                session: watch::channel(None).0,
                password_accounts_enabled: AtomicBool::new(true),
            }),
        }
    }

    fn accounts(&self) -> MutexGuard<'_, Accounts> {
        self.inner
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The signed-in session, if any
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.inner.session.borrow().clone()
    }

    /// Marks an account as disabled. Returns `false` if there is no such account.
    pub fn disable(&self, email: &str) -> bool {
        self.accounts()
            .by_email
            .get_mut(&normalize(email))
            .map(|account| account.disabled = true)
            .is_some()
    }

    /// Turns email/password signups and sign-ins on or off
    pub fn set_password_accounts_enabled(&self, enabled: bool) {
        self.inner
            .password_accounts_enabled
            .store(enabled, Ordering::SeqCst);
    }

    /// Makes every following sign-out fail with `error`, or succeed again with `None`
    pub fn fail_sign_out_with(&self, error: Option<AuthError>) {
        self.accounts().sign_out_failure = error;
    }

    /// Ends the session from the provider side, as an expired token would
    pub fn revoke_session(&self) {
        self.inner.session.send_replace(None);
    }

    fn check_enabled(&self) -> AuthResult<()> {
        if self.inner.password_accounts_enabled.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AuthError::OperationNotAllowed)
        }
    }

    fn establish(&self, account: &Account) -> Session {
        let session = Session::new(account.uid.clone(), account.email.clone());
        self.inner.session.send_replace(Some(session.clone()));
        session
    }

    fn register(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.check_enabled()?;
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let key = normalize(email);
        let account = {
            let mut accounts = self.accounts();
            if accounts.by_email.contains_key(&key) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let account = Account {
                uid: UserId::new(random_id(USER_ID_LEN)),
                email: email.trim().to_string(),
                password: password.to_string(),
                disabled: false,
            };
            accounts.by_email.insert(key, account.clone());
            account
        };

        tracing::debug!(uid = %account.uid, "account created");
        Ok(self.establish(&account))
    }

    fn verify(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.check_enabled()?;
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }

        let key = normalize(email);
        let account = {
            let mut accounts = self.accounts();
            let Some(account) = accounts.by_email.get(&key).cloned() else {
                return Err(AuthError::UserNotFound);
            };
            if account.disabled {
                return Err(AuthError::UserDisabled);
            }

            let failures = accounts.failed_attempts.entry(key).or_insert(0);
            if *failures >= MAX_FAILED_ATTEMPTS {
                return Err(AuthError::TooManyRequests);
            }
            if account.password != password {
                *failures += 1;
                return Err(AuthError::WrongPassword);
            }
            *failures = 0;
            account
        };

        Ok(self.establish(&account))
    }

    fn end(&self) -> AuthResult<()> {
        if let Some(error) = self.accounts().sign_out_failure.clone() {
            return Err(error);
        }
        self.inner.session.send_replace(None);
        Ok(())
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.register(email, password)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.verify(email, password)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.end()
    }

    fn watch_session(&self) -> SessionStream {
        watch_stream(self.inner.session.subscribe())
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

//! Identity Toolkit REST client.
//!
//! Signing in yields an ID token, a refresh token and an expiry. Those
//! credentials are kept in a watch channel: the session stream is derived from
//! it and Firestore requests read the token from it. Sign-out is local; the
//! REST API has no endpoint for it.

use crate::error::{AuthError, AuthResult};
use crate::model::{Session, UserId};
use crate::providers::{IdentityProvider, SessionStream, watch_stream};
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN_SECS: i64 = 60;

/// Token lifetime assumed when the provider's value does not parse
const DEFAULT_EXPIRY_SECS: i64 = 3600;

/// Signed-in credentials, persisted to the session file when one is configured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account uid
    pub uid: UserId,
    /// Account email
    pub email: String,
    /// Bearer token for Firestore
    pub id_token: String,
    /// Long-lived token used to mint new ID tokens
    pub refresh_token: String,
    /// When `id_token` stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    /// The session these credentials belong to
    #[must_use]
    pub fn session(&self) -> Session {
        Session::new(self.uid.clone(), self.email.clone())
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    email: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn expiry(now: DateTime<Utc>, expires_in: &str) -> DateTime<Utc> {
    now + Duration::seconds(expires_in.parse().unwrap_or(DEFAULT_EXPIRY_SECS))
}

/// Maps an Identity Toolkit error message onto an [`AuthError`].
///
/// Messages look like `WEAK_PASSWORD : Password should be at least 6 characters`;
/// only the leading code is matched.
#[must_use]
pub fn map_error(message: &str) -> AuthError {
    let code = message
        .split([' ', ':'])
        .next()
        .unwrap_or_default();
    match code {
        "EMAIL_EXISTS" => AuthError::EmailAlreadyInUse,
        "INVALID_EMAIL" => AuthError::InvalidEmail,
        "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => AuthError::OperationNotAllowed,
        "WEAK_PASSWORD" => AuthError::WeakPassword,
        "USER_DISABLED" => AuthError::UserDisabled,
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => AuthError::UserNotFound,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => AuthError::WrongPassword,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyRequests,
        other => AuthError::other(
            format!("auth/{}", other.to_ascii_lowercase().replace('_', "-")),
            message,
        ),
    }
}

struct Inner {
    client: Client,
    api_key: String,
    credentials: watch::Sender<Option<Credentials>>,
    session_file: Option<PathBuf>,
}

/// Email/password identity over the Identity Toolkit REST API
#[derive(Clone)]
pub struct FirebaseIdentityProvider {
    inner: Arc<Inner>,
}

impl FirebaseIdentityProvider {
    /// Creates a provider for the project owning `api_key`.
    ///
    /// When `session_file` holds credentials from an earlier run, they are
    /// restored and the first session item reports the signed-in account.
    #[must_use]
    pub fn new(client: Client, api_key: impl Into<String>, session_file: Option<PathBuf>) -> Self {
        let restored = session_file.as_ref().and_then(|path| {
            let raw = std::fs::read_to_string(path).ok()?;
            match serde_json::from_str::<Credentials>(&raw) {
                Ok(credentials) => {
                    tracing::info!(uid = %credentials.uid, "restored saved session");
                    Some(credentials)
                },
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "ignoring unreadable session file");
                    None
                },
            }
        });

        Self {
            inner: Arc::new(Inner {
                client,
                api_key: api_key.into(),
                credentials: watch::channel(restored).0,
                session_file,
            }),
        }
    }

    fn current(&self) -> Option<Credentials> {
        self.inner.credentials.borrow().clone()
    }

    fn store(&self, credentials: Option<Credentials>) {
        if let Some(path) = &self.inner.session_file {
            let written = match &credentials {
                Some(credentials) => serde_json::to_string(credentials)
                    .map_err(std::io::Error::other)
                    .and_then(|json| std::fs::write(path, json)),
                None => match std::fs::remove_file(path) {
                    Err(error) if error.kind() != std::io::ErrorKind::NotFound => Err(error),
                    _ => Ok(()),
                },
            };
            if let Err(error) = written {
                tracing::warn!(path = %path.display(), %error, "could not update session file");
            }
        }
        self.inner.credentials.send_replace(credentials);
    }

    async fn password_call(&self, endpoint: &str, email: &str, password: &str) -> AuthResult<Session> {
        let response = self
            .inner
            .client
            .post(format!("{IDENTITY_URL}/accounts:{endpoint}"))
            .query(&[("key", self.inner.api_key.as_str())])
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|e| AuthError::other("auth/network-request-failed", e.to_string()))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: PasswordResponse = response
            .json()
            .await
            .map_err(|e| AuthError::other("auth/internal-error", e.to_string()))?;
        let credentials = Credentials {
            uid: UserId::new(body.local_id),
            email: body.email,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_at: expiry(Utc::now(), &body.expires_in),
        };
        let session = credentials.session();
        self.store(Some(credentials));
        Ok(session)
    }

    async fn refresh(&self, stale: Credentials) -> AuthResult<Credentials> {
        tracing::debug!(uid = %stale.uid, "refreshing id token");
        let response = self
            .inner
            .client
            .post(TOKEN_URL)
            .query(&[("key", self.inner.api_key.as_str())])
            .json(&RefreshRequest {
                grant_type: "refresh_token",
                refresh_token: &stale.refresh_token,
            })
            .send()
            .await
            .map_err(|e| AuthError::other("auth/network-request-failed", e.to_string()))?;

        if !response.status().is_success() {
            let error = rejection(response).await;
            // The refresh token itself was rejected: the session is over
            tracing::warn!(uid = %stale.uid, %error, "session expired");
            self.store(None);
            return Err(error);
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::other("auth/internal-error", e.to_string()))?;
        let credentials = Credentials {
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_at: expiry(Utc::now(), &body.expires_in),
            ..stale
        };
        self.store(Some(credentials.clone()));
        Ok(credentials)
    }

    /// A valid ID token for the signed-in account, refreshed if needed.
    ///
    /// `Ok(None)` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the token had to be refreshed and the refresh failed.
    pub async fn id_token(&self) -> AuthResult<Option<String>> {
        let Some(credentials) = self.current() else {
            return Ok(None);
        };
        if credentials.is_fresh(Utc::now()) {
            return Ok(Some(credentials.id_token));
        }
        let refreshed = self.refresh(credentials).await?;
        Ok(Some(refreshed.id_token))
    }
}

async fn rejection(response: reqwest::Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => map_error(&envelope.error.message),
        Err(_) => AuthError::other("auth/internal-error", format!("{status}: {body}")),
    }
}

impl IdentityProvider for FirebaseIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.password_call("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.password_call("signInWithPassword", email, password).await
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.store(None);
        Ok(())
    }

    fn watch_session(&self) -> SessionStream {
        let sessions = watch_stream(self.inner.credentials.subscribe())
            .map(|credentials| credentials.as_ref().map(Credentials::session));
        Box::pin(sessions)
    }
}

//! Runtime configuration from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `LIVETODO_BACKEND` | `memory` |
//! | `FIREBASE_API_KEY` | required for `firebase` |
//! | `FIREBASE_PROJECT_ID` | required for `firebase` |
//! | `LIVETODO_POLL_INTERVAL_MS` | `2000`, at least `100` |
//! | `LIVETODO_SESSION_FILE` | unset |
//! | `LIVETODO_SUCCESS_TOAST_MS` | `3000` |
//! | `LIVETODO_ERROR_TOAST_MS` | `5000` |

use crate::error::ConfigError;
use crate::firebase::FirebaseConfig;
use crate::notifications::NotificationCenter;
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// Backend selector variable
pub const BACKEND: &str = "LIVETODO_BACKEND";
/// Firebase web API key variable
pub const FIREBASE_API_KEY: &str = "FIREBASE_API_KEY";
/// Firebase project id variable
pub const FIREBASE_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
/// Live query polling period variable
pub const POLL_INTERVAL_MS: &str = "LIVETODO_POLL_INTERVAL_MS";
/// Session persistence path variable
pub const SESSION_FILE: &str = "LIVETODO_SESSION_FILE";
/// Success toast lifetime variable
pub const SUCCESS_TOAST_MS: &str = "LIVETODO_SUCCESS_TOAST_MS";
/// Error toast lifetime variable
pub const ERROR_TOAST_MS: &str = "LIVETODO_ERROR_TOAST_MS";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Where identities and todos live
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// In-process, forgotten on exit
    #[default]
    Memory,
    /// Firebase Authentication and Cloud Firestore
    Firebase,
}

/// Everything the binary reads from its environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Selected backend
    pub backend: Backend,
    /// Firebase web API key
    pub api_key: Option<String>,
    /// Firebase project id
    pub project_id: Option<String>,
    /// Live query polling period for the hosted backend
    pub poll_interval: Duration,
    /// Where to keep the hosted session between runs
    pub session_file: Option<PathBuf>,
    /// How long success notifications stay up
    pub success_auto_close: Duration,
    /// How long error notifications stay up
    pub error_auto_close: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            api_key: None,
            project_id: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            session_file: None,
            success_auto_close: NotificationCenter::SUCCESS_AUTO_CLOSE,
            error_auto_close: NotificationCenter::ERROR_AUTO_CLOSE,
        }
    }
}

impl AppConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for values that do not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for values that do not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let backend = match get(BACKEND) {
            Some(raw) => Backend::from_str(raw.trim(), true).map_err(|_| ConfigError::Invalid {
                name: BACKEND,
                reason: format!("expected memory or firebase, got {raw:?}"),
            })?,
            None => defaults.backend,
        };

        let poll_interval = match get(POLL_INTERVAL_MS) {
            Some(raw) => {
                let millis = millis(POLL_INTERVAL_MS, &raw)?;
                if millis < MIN_POLL_INTERVAL_MS {
                    return Err(ConfigError::Invalid {
                        name: POLL_INTERVAL_MS,
                        reason: format!("must be at least {MIN_POLL_INTERVAL_MS}"),
                    });
                }
                Duration::from_millis(millis)
            },
            None => defaults.poll_interval,
        };

        Ok(Self {
            backend,
            api_key: get(FIREBASE_API_KEY),
            project_id: get(FIREBASE_PROJECT_ID),
            poll_interval,
            session_file: get(SESSION_FILE).map(PathBuf::from),
            success_auto_close: get(SUCCESS_TOAST_MS)
                .map(|raw| millis(SUCCESS_TOAST_MS, &raw).map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.success_auto_close),
            error_auto_close: get(ERROR_TOAST_MS)
                .map(|raw| millis(ERROR_TOAST_MS, &raw).map(Duration::from_millis))
                .transpose()?
                .unwrap_or(defaults.error_auto_close),
        })
    }

    /// Settings for the hosted backend.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if the API key or project id is unset.
    pub fn firebase(&self) -> Result<FirebaseConfig, ConfigError> {
        Ok(FirebaseConfig {
            api_key: self.api_key.clone().ok_or(ConfigError::Missing(FIREBASE_API_KEY))?,
            project_id: self
                .project_id
                .clone()
                .ok_or(ConfigError::Missing(FIREBASE_PROJECT_ID))?,
            poll_interval: self.poll_interval,
            session_file: self.session_file.clone(),
        })
    }
}

fn millis(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        reason: format!("expected milliseconds, got {raw:?}"),
    })
}

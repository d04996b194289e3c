//! Error types for identity, document and configuration operations.

use crate::model::TodoId;
use thiserror::Error;

/// Result type alias for identity provider operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Result type alias for document store operations.
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

/// Failures reported by an identity provider.
///
/// Each variant corresponds to one provider error code (see [`AuthError::code`]).
/// Anything the table below does not know about is kept as [`AuthError::Other`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// An account already exists for this email.
    #[error("email already in use")]
    EmailAlreadyInUse,

    /// The email address is malformed.
    #[error("invalid email")]
    InvalidEmail,

    /// Email/password sign-in is disabled for the project.
    #[error("operation not allowed")]
    OperationNotAllowed,

    /// The password is too weak.
    #[error("weak password")]
    WeakPassword,

    /// The account has been disabled.
    #[error("user disabled")]
    UserDisabled,

    /// No account exists for this email.
    #[error("user not found")]
    UserNotFound,

    /// The password does not match.
    #[error("wrong password")]
    WrongPassword,

    /// Too many failed attempts.
    #[error("too many requests")]
    TooManyRequests,

    /// Any other provider failure.
    #[error("{code}: {detail}")]
    Other {
        /// Provider error code, e.g. `auth/network-request-failed`
        code: String,
        /// Free-form detail, only logged
        detail: String,
    },
}

/// User-facing rendering of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDescription {
    /// Short heading
    pub title: &'static str,
    /// Sentence shown to the user and stored as the session error
    pub message: &'static str,
    /// Single glyph shown next to the title
    pub icon: &'static str,
}

static KNOWN_CODES: [(&str, AuthError); 8] = [
    ("auth/email-already-in-use", AuthError::EmailAlreadyInUse),
    ("auth/invalid-email", AuthError::InvalidEmail),
    ("auth/operation-not-allowed", AuthError::OperationNotAllowed),
    ("auth/weak-password", AuthError::WeakPassword),
    ("auth/user-disabled", AuthError::UserDisabled),
    ("auth/user-not-found", AuthError::UserNotFound),
    ("auth/wrong-password", AuthError::WrongPassword),
    ("auth/too-many-requests", AuthError::TooManyRequests),
];

impl AuthError {
    /// Builds an [`AuthError::Other`].
    #[must_use]
    pub fn other(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Other {
            code: code.into(),
            detail: detail.into(),
        }
    }

    /// Maps a provider error code onto a variant.
    ///
    /// Unknown codes become [`AuthError::Other`] with an empty detail.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        KNOWN_CODES
            .iter()
            .find(|(known, _)| *known == code)
            .map_or_else(|| Self::other(code, ""), |(_, error)| error.clone())
    }

    /// The provider error code for this error.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Other { code, .. } => code,
            known => KNOWN_CODES
                .iter()
                .find(|(_, error)| error == known)
                .map_or("auth/internal-error", |(code, _)| *code),
        }
    }

    /// Title, message and icon to show for this error.
    #[must_use]
    pub const fn describe(&self) -> ErrorDescription {
        let (title, message, icon) = match self {
            Self::EmailAlreadyInUse => (
                "Email Already Registered",
                "This email is already registered. Please login instead.",
                "⚠️",
            ),
            Self::InvalidEmail => (
                "Invalid Email Format",
                "Please enter a valid email address (e.g., user@example.com)",
                "❌",
            ),
            Self::OperationNotAllowed => (
                "Operation Not Allowed",
                "Email/password accounts are not enabled. Please contact support.",
                "🚫",
            ),
            Self::WeakPassword => (
                "Weak Password",
                "Password should be at least 6 characters long and include numbers and special characters.",
                "🔒",
            ),
            Self::UserDisabled => (
                "Account Disabled",
                "This account has been disabled. Please contact support.",
                "🚫",
            ),
            Self::UserNotFound => (
                "Account Not Found",
                "No account found with this email. Please check your email or sign up.",
                "🔍",
            ),
            Self::WrongPassword => (
                "Incorrect Password",
                "The password you entered is incorrect. Please try again or use \"Forgot Password\".",
                "🔑",
            ),
            Self::TooManyRequests => (
                "Too Many Attempts",
                "Too many failed login attempts. Please try again after a few minutes.",
                "⏰",
            ),
            Self::Other { .. } => ("Error", "An error occurred. Please try again.", "❌"),
        };
        ErrorDescription {
            title,
            message,
            icon,
        }
    }
}

/// Failures reported by a document store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The document does not exist.
    #[error("No document to update: {0}")]
    NotFound(TodoId),

    /// The caller may not read or write the document.
    #[error("Missing or insufficient permissions: {0}")]
    PermissionDenied(String),

    /// The service could not be reached or answered with a server error.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be decoded.
    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// Invalid or missing configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} must be set for the firebase backend")]
    Missing(&'static str),

    /// A variable is set to something unusable.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

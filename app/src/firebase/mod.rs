//! Hosted backend over the Firebase REST APIs.
//!
//! [`FirebaseIdentityProvider`] talks to Identity Toolkit and Secure Token;
//! [`FirestoreDocumentStore`] talks to Cloud Firestore with the signed-in
//! account's ID token. Build both with [`connect`] so they share credentials.

mod firestore;
mod identity;
pub mod value;

pub use firestore::{COLLECTION, FirestoreDocumentStore};
pub use identity::{Credentials, FirebaseIdentityProvider, map_error};

use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

/// Project settings for the hosted backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirebaseConfig {
    /// Web API key
    pub api_key: String,
    /// Project id
    pub project_id: String,
    /// How often the live query re-runs
    pub poll_interval: Duration,
    /// Where to keep credentials between runs
    pub session_file: Option<PathBuf>,
}

/// Identity provider and document store sharing one HTTP client and one session
#[must_use]
pub fn connect(config: &FirebaseConfig) -> (FirebaseIdentityProvider, FirestoreDocumentStore) {
    let client = Client::new();
    let identity =
        FirebaseIdentityProvider::new(client.clone(), &config.api_key, config.session_file.clone());
    let documents = FirestoreDocumentStore::new(
        client,
        &config.project_id,
        identity.clone(),
        config.poll_interval,
    );
    (identity, documents)
}

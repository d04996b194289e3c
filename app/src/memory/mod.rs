//! In-process backend.
//!
//! Behaves like the hosted services closely enough for the REPL's offline
//! mode and for every test: provider error codes, generated ids, server
//! timestamps and live queries that re-run on every write.

mod documents;
mod identity;

pub use documents::MemoryDocumentStore;
pub use identity::MemoryIdentityProvider;

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of generated document ids
pub const DOCUMENT_ID_LEN: usize = 20;

/// Length of generated user ids
pub const USER_ID_LEN: usize = 28;

/// Random alphanumeric id, the shape Firestore gives auto ids
pub(crate) fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

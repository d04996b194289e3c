//! Firestore REST document store.

use super::identity::FirebaseIdentityProvider;
use super::value::{self, QueryRow};
use crate::error::{DocumentError, DocumentResult};
use crate::memory::{DOCUMENT_ID_LEN, random_id};
use crate::model::{NewTodo, TodoId, TodoItem, TodoPatch, UserId};
use crate::providers::{DocumentStore, TodoStream};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

/// Collection holding every user's todos
pub const COLLECTION: &str = "todos";

/// Todos stored in Cloud Firestore.
///
/// Requests are authorized with the ID token of whoever is signed in to the
/// paired identity provider. The live query polls `runQuery` and emits only
/// when the result set changes.
#[derive(Clone)]
pub struct FirestoreDocumentStore {
    client: Client,
    documents_path: String,
    documents_url: String,
    identity: FirebaseIdentityProvider,
    poll_interval: Duration,
}

impl FirestoreDocumentStore {
    /// Creates a store for the default database of `project_id`
    #[must_use]
    pub fn new(
        client: Client,
        project_id: &str,
        identity: FirebaseIdentityProvider,
        poll_interval: Duration,
    ) -> Self {
        let documents_path = format!("projects/{project_id}/databases/(default)/documents");
        Self {
            client,
            documents_url: format!("{FIRESTORE_URL}/{documents_path}"),
            documents_path,
            identity,
            poll_interval,
        }
    }

    fn document_url(&self, id: &TodoId) -> String {
        format!("{}/{COLLECTION}/{id}", self.documents_url)
    }

    fn document_name(&self, id: &TodoId) -> String {
        format!("{}/{COLLECTION}/{id}", self.documents_path)
    }

    async fn authorized(&self, request: RequestBuilder) -> DocumentResult<Response> {
        let token = self
            .identity
            .id_token()
            .await
            .map_err(|e| DocumentError::PermissionDenied(e.to_string()))?
            .ok_or_else(|| DocumentError::PermissionDenied("not signed in".to_string()))?;

        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DocumentError::Unavailable(e.to_string()))
    }

    async fn run_query(&self, owner: &UserId) -> DocumentResult<Vec<TodoItem>> {
        let request = self
            .client
            .post(format!("{}:runQuery", self.documents_url))
            .json(&value::owner_query(COLLECTION, owner));
        let response = checked(self.authorized(request).await?, None).await?;
        let rows: Vec<QueryRow> = response
            .json()
            .await
            .map_err(|e| DocumentError::Malformed(e.to_string()))?;

        let mut todos = rows
            .iter()
            .filter_map(|row| row.document.as_ref())
            .map(value::decode)
            .collect::<DocumentResult<Vec<_>>>()?;
        // runQuery without orderBy has no defined order
        todos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(todos)
    }
}

/// Passes successful responses through and classifies the rest.
async fn checked(response: Response, target: Option<&TodoId>) -> DocumentResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    Err(match (status, target) {
        (StatusCode::NOT_FOUND, Some(id)) => DocumentError::NotFound(id.clone()),
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            DocumentError::PermissionDenied(message)
        },
        _ => DocumentError::Unavailable(format!("{status}: {message}")),
    })
}

impl DocumentStore for FirestoreDocumentStore {
    fn watch_todos(&self, owner: &UserId) -> TodoStream {
        let store = self.clone();
        let owner = owner.clone();

        Box::pin(async_stream::stream! {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Vec<TodoItem>> = None;
            loop {
                ticker.tick().await;
                match store.run_query(&owner).await {
                    Ok(todos) => {
                        if last.as_ref() != Some(&todos) {
                            last = Some(todos.clone());
                            yield Ok(todos);
                        }
                    },
                    Err(error) => {
                        tracing::debug!(%owner, %error, "poll failed");
                        last = None;
                        yield Err(error);
                    },
                }
            }
        })
    }

    async fn create_todo(&self, todo: NewTodo) -> DocumentResult<TodoItem> {
        // Client-chosen id, as the Firebase SDKs do
        let id = TodoId::new(random_id(DOCUMENT_ID_LEN));
        let request = self
            .client
            .post(format!("{}:commit", self.documents_url))
            .json(&value::create_write(&self.document_name(&id), &todo));
        checked(self.authorized(request).await?, None).await?;

        tracing::debug!(%id, "document created");
        Ok(TodoItem {
            id,
            text: todo.text,
            completed: todo.completed,
            user_id: todo.user_id,
            created_at: None,
        })
    }

    async fn update_todo(&self, id: &TodoId, patch: &TodoPatch) -> DocumentResult<()> {
        // A PATCH without a mask replaces the whole document
        if patch.is_empty() {
            return Ok(());
        }
        let (document, mask) = value::encode_patch(patch);
        let mut query: Vec<(&str, &str)> = mask
            .into_iter()
            .map(|path| ("updateMask.fieldPaths", path))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let request = self
            .client
            .patch(self.document_url(id))
            .query(&query)
            .json(&document);
        checked(self.authorized(request).await?, Some(id)).await?;
        Ok(())
    }

    async fn delete_todo(&self, id: &TodoId) -> DocumentResult<()> {
        let request = self.client.delete(self.document_url(id));
        checked(self.authorized(request).await?, None).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;

    fn store() -> FirestoreDocumentStore {
        let client = Client::new();
        let identity = FirebaseIdentityProvider::new(client.clone(), "key", None);
        FirestoreDocumentStore::new(client, "demo", identity, Duration::from_millis(100))
    }

    #[test]
    fn test_document_urls() {
        let store = store();
        assert_eq!(
            store.document_url(&TodoId::new("abc")),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents/todos/abc"
        );
        assert_eq!(
            store.document_name(&TodoId::new("abc")),
            "projects/demo/databases/(default)/documents/todos/abc"
        );
    }

    #[tokio::test]
    async fn test_empty_patch_sends_nothing() {
        // Without a session any request would fail with PermissionDenied
        let result = store().update_todo(&TodoId::new("abc"), &TodoPatch::default()).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_writes_require_a_session() {
        let result = store().delete_todo(&TodoId::new("abc")).await;
        assert_eq!(
            result,
            Err(DocumentError::PermissionDenied("not signed in".to_string()))
        );
    }
}

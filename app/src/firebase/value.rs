//! Firestore document encoding for todo items.
//!
//! Firestore REST documents carry typed values (`{"stringValue": "..."}`).
//! Only the fields a todo uses are read; anything else in the document is
//! ignored.

use crate::error::{DocumentError, DocumentResult};
use crate::model::{NewTodo, TodoId, TodoItem, TodoPatch, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Field names as stored in the `todos` collection
pub mod field {
    /// Description
    pub const TEXT: &str = "text";
    /// Completion flag
    pub const COMPLETED: &str = "completed";
    /// Owner uid
    pub const USER_ID: &str = "userId";
    /// Server timestamp, set on create
    pub const CREATED_AT: &str = "createdAt";
}

/// A Firestore REST document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name, ending in the document id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Typed field values
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Server creation time
    #[serde(default, skip_serializing)]
    pub create_time: Option<DateTime<Utc>>,
}

impl Document {
    /// The last path segment of the resource name
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.name.rsplit('/').next().filter(|id| !id.is_empty())
    }

    fn string(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.get("stringValue")?.as_str()
    }

    fn boolean(&self, name: &str) -> Option<bool> {
        self.fields.get(name)?.get("booleanValue")?.as_bool()
    }

    fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        let raw = self.fields.get(name)?.get("timestampValue")?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|time| time.with_timezone(&Utc))
    }
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

fn boolean_value(value: bool) -> Value {
    json!({ "booleanValue": value })
}

/// Document body for a new todo
#[must_use]
pub fn encode_new(todo: &NewTodo) -> Document {
    let mut fields = Map::new();
    fields.insert(field::TEXT.to_string(), string_value(&todo.text));
    fields.insert(field::COMPLETED.to_string(), boolean_value(todo.completed));
    fields.insert(field::USER_ID.to_string(), string_value(todo.user_id.as_str()));
    Document {
        fields,
        ..Document::default()
    }
}

/// Server-side clock for field transforms
const REQUEST_TIME: &str = "REQUEST_TIME";

/// `commit` body creating the todo at resource `name`.
///
/// `createdAt` is filled in by Firestore from the request time, and the
/// write fails if a document with that name already exists.
#[must_use]
pub fn create_write(name: &str, todo: &NewTodo) -> Value {
    let document = Document {
        name: name.to_string(),
        ..encode_new(todo)
    };
    json!({
        "writes": [{
            "update": document,
            "updateTransforms": [{
                "fieldPath": field::CREATED_AT,
                "setToServerValue": REQUEST_TIME,
            }],
            "currentDocument": { "exists": false },
        }]
    })
}

/// Document body and update mask for a partial update
#[must_use]
pub fn encode_patch(patch: &TodoPatch) -> (Document, Vec<&'static str>) {
    let mut fields = Map::new();
    let mut mask = Vec::new();
    if let Some(text) = &patch.text {
        fields.insert(field::TEXT.to_string(), string_value(text));
        mask.push(field::TEXT);
    }
    if let Some(completed) = patch.completed {
        fields.insert(field::COMPLETED.to_string(), boolean_value(completed));
        mask.push(field::COMPLETED);
    }
    (
        Document {
            fields,
            ..Document::default()
        },
        mask,
    )
}

/// Reads a todo out of a stored document.
///
/// `createdAt` wins over the document's create time when both are present.
///
/// # Errors
///
/// `Malformed` if the name or the owner field is missing.
pub fn decode(document: &Document) -> DocumentResult<TodoItem> {
    let id = document
        .id()
        .ok_or_else(|| DocumentError::Malformed(format!("no document id in {:?}", document.name)))?;
    let user_id = document
        .string(field::USER_ID)
        .ok_or_else(|| DocumentError::Malformed(format!("{id} has no {}", field::USER_ID)))?;

    Ok(TodoItem {
        id: TodoId::new(id),
        text: document.string(field::TEXT).unwrap_or_default().to_string(),
        completed: document.boolean(field::COMPLETED).unwrap_or(false),
        user_id: UserId::new(user_id),
        created_at: document.timestamp(field::CREATED_AT).or(document.create_time),
    })
}

/// `runQuery` body selecting the todos owned by `owner`
#[must_use]
pub fn owner_query(collection: &str, owner: &UserId) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": field::USER_ID },
                    "op": "EQUAL",
                    "value": string_value(owner.as_str()),
                }
            }
        }
    })
}

/// One element of a `runQuery` response
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRow {
    /// Absent on the trailing read-time-only row
    #[serde(default)]
    pub document: Option<Document>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored(fields: Value) -> Document {
        let Ok(document) = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/todos/abc123",
            "fields": fields,
            "createTime": "2025-01-01T10:00:00.123456Z",
            "updateTime": "2025-01-01T10:00:00.123456Z",
        })) else {
            panic!("fixture does not parse");
        };
        document
    }

    #[test]
    fn test_decode_stored_document() {
        let document = stored(json!({
            "text": { "stringValue": "milk" },
            "completed": { "booleanValue": true },
            "userId": { "stringValue": "alice" },
        }));
        let Ok(item) = decode(&document) else {
            panic!("decode failed");
        };
        assert_eq!(item.id, TodoId::new("abc123"));
        assert_eq!(item.text, "milk");
        assert!(item.completed);
        assert_eq!(item.user_id, UserId::new("alice"));
        assert_eq!(
            item.created_at.map(|time| time.timestamp()),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap().timestamp())
        );
    }

    #[test]
    fn test_created_at_field_takes_precedence() {
        let document = stored(json!({
            "userId": { "stringValue": "alice" },
            "createdAt": { "timestampValue": "2024-06-01T00:00:00Z" },
        }));
        let created = decode(&document).ok().and_then(|item| item.created_at);
        assert_eq!(created, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single());
    }

    #[test]
    fn test_missing_owner_is_malformed() {
        let document = stored(json!({ "text": { "stringValue": "milk" } }));
        assert!(matches!(decode(&document), Err(DocumentError::Malformed(_))));
    }

    #[test]
    fn test_create_write_stamps_server_time() {
        let name = "projects/p/databases/(default)/documents/todos/abc123";
        let body = create_write(name, &NewTodo::new("milk", UserId::new("alice")));
        assert_eq!(
            body,
            json!({
                "writes": [{
                    "update": {
                        "name": name,
                        "fields": {
                            "text": { "stringValue": "milk" },
                            "completed": { "booleanValue": false },
                            "userId": { "stringValue": "alice" },
                        }
                    },
                    "updateTransforms": [{
                        "fieldPath": "createdAt",
                        "setToServerValue": "REQUEST_TIME",
                    }],
                    "currentDocument": { "exists": false },
                }]
            })
        );
    }

    #[test]
    fn test_empty_patch_has_empty_mask() {
        let (document, mask) = encode_patch(&TodoPatch::default());
        assert!(mask.is_empty());
        assert!(document.fields.is_empty());
    }

    #[test]
    fn test_encode_patch_masks_only_present_fields() {
        let (document, mask) = encode_patch(&TodoPatch::completed(true));
        assert_eq!(mask, vec![field::COMPLETED]);
        assert_eq!(document.fields.len(), 1);

        let (_, mask) = encode_patch(&TodoPatch {
            text: Some("eggs".to_string()),
            completed: Some(false),
        });
        assert_eq!(mask, vec![field::TEXT, field::COMPLETED]);
    }

    #[test]
    fn test_owner_query_filters_on_user_id() {
        let query = owner_query("todos", &UserId::new("alice"));
        let filter = &query["structuredQuery"]["where"]["fieldFilter"];
        assert_eq!(filter["field"]["fieldPath"], "userId");
        assert_eq!(filter["op"], "EQUAL");
        assert_eq!(filter["value"]["stringValue"], "alice");
    }
}

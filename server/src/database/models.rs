//! Database models
//!
//! Rust structs representing database entities and request payloads.
//! All models use serde for serialization to API callers.

use crate::access::Capability;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A note. `deleted_at` set means the note is in the trash.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub content: String,
    pub is_public: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Create note request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_public: bool,
}

/// Update note request. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_public: Option<bool>,
}

/// Collaborator grant on a note
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionGrant {
    pub id: String,
    pub note_id: String,
    pub user_id: String,
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
}

/// Grant joined with the collaborator's identity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Collaborator {
    pub permission_id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub can_edit: bool,
}

/// Share request as sent by the client
#[derive(Debug, Clone, Deserialize)]
pub struct ShareRequest {
    #[serde(alias = "targetEmail")]
    pub target_email: String,
    #[serde(alias = "canEdit", default)]
    pub can_edit: bool,
}

/// A note reached through a grant, with its owner's name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SharedNoteRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub note: Note,
    pub owner_name: String,
    pub can_edit: bool,
}

/// A note annotated with the caller's capability
#[derive(Debug, Clone, Serialize)]
pub struct NoteView {
    #[serde(flatten)]
    pub note: Note,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    pub capability: Capability,
}

/// Listing filters for `GET notes?filter=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteFilter {
    #[default]
    All,
    Shared,
    Favorites,
    Trash,
}

impl NoteFilter {
    /// Unknown or missing filters fall back to `All`
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("shared") => NoteFilter::Shared,
            Some("favorites") => NoteFilter::Favorites,
            Some("trash") => NoteFilter::Trash,
            _ => NoteFilter::All,
        }
    }
}

/// File attached to a note. `stored_name` is the blob hash.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: String,
    pub note_id: String,
    pub stored_name: String,
    pub original_name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// New file metadata, inserted only after the blob is durable
#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub note_id: &'a str,
    pub stored_name: &'a str,
    pub original_name: &'a str,
    pub storage_path: &'a str,
    pub mime_type: &'a str,
    pub size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parse() {
        assert_eq!(NoteFilter::parse(Some("trash")), NoteFilter::Trash);
        assert_eq!(NoteFilter::parse(Some("shared")), NoteFilter::Shared);
        assert_eq!(NoteFilter::parse(Some("favorites")), NoteFilter::Favorites);
        assert_eq!(NoteFilter::parse(Some("bogus")), NoteFilter::All);
        assert_eq!(NoteFilter::parse(None), NoteFilter::All);
    }

    #[test]
    fn test_share_request_accepts_client_field_names() {
        let req: ShareRequest =
            serde_json::from_str(r#"{"targetEmail":"b@example.com","canEdit":true}"#).unwrap();

        assert_eq!(req.target_email, "b@example.com");
        assert!(req.can_edit);
    }

    #[test]
    fn test_user_hash_not_serialized() {
        let user = User {
            id: "u1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "secret-hash".into(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}

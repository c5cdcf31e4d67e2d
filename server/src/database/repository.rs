//! Repository layer for database operations
//!
//! All SQL lives here. Mutations that depend on who is asking carry the
//! ownership or grant check in their own predicate, so the check and the
//! write happen in one statement or one transaction.

use super::models::*;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Users =====

    /// Insert a user. Duplicate emails surface as `Conflict`.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email is already registered".to_string())
            }
            other => AppError::Database(other),
        })?;

        tracing::debug!("Created user: {}", id);
        Ok(user)
    }

    pub async fn find_user(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    // ===== Notes =====

    /// Create a note owned by `owner_id`
    pub async fn create_note(&self, owner_id: &str, req: &CreateNoteRequest) -> Result<Note> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let note = sqlx::query_as::<_, Note>(
            r#"
            INSERT INTO notes (id, owner_id, title, content, is_public, is_favorite, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(req.is_public)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created note: {} for owner: {}", id, owner_id);
        Ok(note)
    }

    /// Fetch a note whether active or trashed
    pub async fn find_note(&self, id: &str) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(note)
    }

    /// Notes owned by `owner_id` under an owner-scoped filter
    pub async fn list_owned_notes(&self, owner_id: &str, filter: NoteFilter) -> Result<Vec<Note>> {
        let predicate = match filter {
            NoteFilter::Trash => "owner_id = ? AND deleted_at IS NOT NULL",
            NoteFilter::Favorites => "owner_id = ? AND is_favorite = 1 AND deleted_at IS NULL",
            NoteFilter::All | NoteFilter::Shared => "owner_id = ? AND deleted_at IS NULL",
        };

        let sql = format!("SELECT * FROM notes WHERE {} ORDER BY updated_at DESC", predicate);

        let notes = sqlx::query_as::<_, Note>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(notes)
    }

    /// Active notes granted to `user_id`, with the owner's username
    pub async fn list_shared_notes(&self, user_id: &str) -> Result<Vec<SharedNoteRow>> {
        let notes = sqlx::query_as::<_, SharedNoteRow>(
            r#"
            SELECT n.*, u.username AS owner_name, p.can_edit AS can_edit
            FROM notes n
            JOIN note_permissions p ON p.note_id = n.id
            JOIN users u ON u.id = n.owner_id
            WHERE p.user_id = ? AND n.deleted_at IS NULL
            ORDER BY n.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    /// Apply an update on behalf of `editor_id`.
    ///
    /// The row only changes if the editor owns the note or holds an editing
    /// grant at the time of the write, and `is_public` only changes for the
    /// owner. Returns `None` when the predicate rejects the write.
    pub async fn update_note(
        &self,
        id: &str,
        editor_id: &str,
        req: &UpdateNoteRequest,
    ) -> Result<Option<Note>> {
        let now = Utc::now();

        let note = sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
            SET title = COALESCE(?, title),
                content = COALESCE(?, content),
                is_public = COALESCE(?, is_public),
                updated_at = ?
            WHERE id = ?
              AND (
                owner_id = ?
                OR EXISTS (
                    SELECT 1 FROM note_permissions p
                    WHERE p.note_id = notes.id AND p.user_id = ? AND p.can_edit = 1
                )
              )
              AND (? IS NULL OR owner_id = ?)
            RETURNING *
            "#,
        )
        .bind(&req.title)
        .bind(&req.content)
        .bind(req.is_public)
        .bind(now)
        .bind(id)
        .bind(editor_id)
        .bind(editor_id)
        .bind(req.is_public)
        .bind(editor_id)
        .fetch_optional(&self.pool)
        .await?;

        if note.is_some() {
            tracing::debug!("Updated note: {} by {}", id, editor_id);
        }

        Ok(note)
    }

    /// Set `deleted_at` on an active note owned by `owner_id`.
    /// Returns false when nothing changed.
    pub async fn trash_note(&self, id: &str, owner_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let rows = sqlx::query(
            r#"
            UPDATE notes SET deleted_at = ?
            WHERE id = ? AND owner_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(at)
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows > 0 {
            tracing::debug!("Trashed note: {}", id);
        }
        Ok(rows > 0)
    }

    /// Clear `deleted_at` on a trashed note owned by `owner_id`.
    /// Returns false when nothing changed.
    pub async fn restore_note(&self, id: &str, owner_id: &str) -> Result<bool> {
        let rows = sqlx::query(
            r#"
            UPDATE notes SET deleted_at = NULL
            WHERE id = ? AND owner_id = ? AND deleted_at IS NOT NULL
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows > 0 {
            tracing::debug!("Restored note: {}", id);
        }
        Ok(rows > 0)
    }

    /// Flip the favorite flag in one statement. `None` if not owned by `owner_id`.
    pub async fn toggle_favorite(&self, id: &str, owner_id: &str) -> Result<Option<bool>> {
        let is_favorite: Option<bool> = sqlx::query_scalar(
            r#"
            UPDATE notes SET is_favorite = NOT is_favorite
            WHERE id = ? AND owner_id = ?
            RETURNING is_favorite
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(is_favorite)
    }

    /// Remove a note together with its grants and file rows.
    ///
    /// Returns the stored names of the removed files so their blobs can be
    /// released, or `None` if the note is not owned by `owner_id`.
    pub async fn purge_note(&self, id: &str, owner_id: &str) -> Result<Option<Vec<String>>> {
        let mut tx = self.pool.begin().await?;

        let owned: Option<String> =
            sqlx::query_scalar("SELECT id FROM notes WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&mut *tx)
                .await?;

        if owned.is_none() {
            return Ok(None);
        }

        let grants = sqlx::query("DELETE FROM note_permissions WHERE note_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let stored_names: Vec<String> =
            sqlx::query_scalar("SELECT stored_name FROM files WHERE note_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM files WHERE note_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            "Purged note: {} ({} grants, {} files)",
            id,
            grants,
            stored_names.len()
        );
        Ok(Some(stored_names))
    }

    // ===== Grants =====

    pub async fn find_grant(&self, note_id: &str, user_id: &str) -> Result<Option<PermissionGrant>> {
        let grant = sqlx::query_as::<_, PermissionGrant>(
            "SELECT * FROM note_permissions WHERE note_id = ? AND user_id = ?",
        )
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(grant)
    }

    /// Create a grant or overwrite `can_edit` on the existing one.
    ///
    /// The insert only happens while `owner_id` still owns the note and the
    /// note is active; `None` otherwise.
    pub async fn upsert_grant(
        &self,
        note_id: &str,
        owner_id: &str,
        user_id: &str,
        can_edit: bool,
    ) -> Result<Option<PermissionGrant>> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let grant = sqlx::query_as::<_, PermissionGrant>(
            r#"
            INSERT INTO note_permissions (id, note_id, user_id, can_edit, created_at)
            SELECT ?, n.id, ?, ?, ?
            FROM notes n
            WHERE n.id = ? AND n.owner_id = ? AND n.deleted_at IS NULL
            ON CONFLICT(note_id, user_id) DO UPDATE SET can_edit = excluded.can_edit
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(can_edit)
        .bind(now)
        .bind(note_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(grant) = &grant {
            tracing::debug!(
                "Upserted grant {} on note {} for user {} (can_edit: {})",
                grant.id,
                note_id,
                user_id,
                can_edit
            );
        }

        Ok(grant)
    }

    /// Returns false if no grant existed
    pub async fn delete_grant(&self, note_id: &str, user_id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM note_permissions WHERE note_id = ? AND user_id = ?")
            .bind(note_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Collaborators of a note in grant insertion order
    pub async fn list_collaborators(&self, note_id: &str) -> Result<Vec<Collaborator>> {
        let collaborators = sqlx::query_as::<_, Collaborator>(
            r#"
            SELECT p.id AS permission_id, p.user_id, u.username, u.email, p.can_edit
            FROM note_permissions p
            JOIN users u ON u.id = p.user_id
            WHERE p.note_id = ?
            ORDER BY p.rowid ASC
            "#,
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(collaborators)
    }

    pub async fn count_grants(&self, note_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM note_permissions WHERE note_id = ?")
                .bind(note_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    // ===== Files =====

    pub async fn create_file(&self, file: &NewFile<'_>) -> Result<FileRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO files (id, note_id, stored_name, original_name, storage_path, mime_type, size, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(file.note_id)
        .bind(file.stored_name)
        .bind(file.original_name)
        .bind(file.storage_path)
        .bind(file.mime_type)
        .bind(file.size)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created file: {} for note: {}", id, file.note_id);
        Ok(record)
    }

    pub async fn find_file(&self, id: &str) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(file)
    }

    pub async fn list_files(&self, note_id: &str) -> Result<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE note_id = ? ORDER BY created_at ASC",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(files)
    }

    /// Delete a file row, returning it if it existed
    pub async fn delete_file(&self, id: &str) -> Result<Option<FileRecord>> {
        let file = sqlx::query_as::<_, FileRecord>("DELETE FROM files WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        if file.is_some() {
            tracing::debug!("Deleted file: {}", id);
        }
        Ok(file)
    }

    /// Number of file rows still pointing at a blob
    pub async fn count_file_references(&self, stored_name: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE stored_name = ?")
            .bind(stored_name)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

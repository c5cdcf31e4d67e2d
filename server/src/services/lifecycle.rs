//! Note lifecycle
//!
//! ```text
//! Active ──trash──▶ Trashed ──restore──▶ Active
//!    └──────purge──────┴──────purge──────▶ Purged
//! ```
//!
//! All transitions need `Own`. Trashing a trashed note and restoring an
//! active one succeed without changing anything. Purging removes the note,
//! its grants and its file rows in one transaction, then releases blobs no
//! other file references.

use crate::access::{AccessResolver, Operation, Principal};
use crate::database::{Note, Repository};
use crate::error::{AppError, Result};
use crate::services::files::release_unreferenced_blobs;
use crate::storage::BlobStore;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteState {
    Active,
    Trashed,
    Purged,
}

impl NoteState {
    pub fn of(note: &Note) -> Self {
        if note.is_trashed() {
            NoteState::Trashed
        } else {
            NoteState::Active
        }
    }
}

/// Result of a trash or restore request
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub note: Note,
    pub state: NoteState,
    /// False when the note was already in the target state
    pub changed: bool,
}

/// Result of a purge
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub note_id: String,
    pub state: NoteState,
    pub files_removed: usize,
}

/// Service for trash, restore and permanent deletion
#[derive(Clone)]
pub struct LifecycleService {
    repo: Repository,
    access: AccessResolver,
    blob_store: BlobStore,
}

impl LifecycleService {
    pub fn new(repo: Repository, access: AccessResolver, blob_store: BlobStore) -> Self {
        Self {
            repo,
            access,
            blob_store,
        }
    }

    /// Move a note to the trash
    pub async fn trash(&self, principal: &Principal, id: &str) -> Result<Transition> {
        let (note, _) = self.access.authorize(principal, id, Operation::Lifecycle).await?;

        if note.is_trashed() {
            tracing::debug!("Note already in trash: {}", id);
            return Ok(Transition {
                state: NoteState::Trashed,
                note,
                changed: false,
            });
        }

        tracing::info!("Moving note to trash: {}", id);
        let changed = self.repo.trash_note(id, &note.owner_id, Utc::now()).await?;

        self.settled(id, changed).await
    }

    /// Bring a note back from the trash
    pub async fn restore(&self, principal: &Principal, id: &str) -> Result<Transition> {
        let (note, _) = self.access.authorize(principal, id, Operation::Lifecycle).await?;

        if !note.is_trashed() {
            tracing::debug!("Note not in trash: {}", id);
            return Ok(Transition {
                state: NoteState::Active,
                note,
                changed: false,
            });
        }

        tracing::info!("Restoring note: {}", id);
        let changed = self.repo.restore_note(id, &note.owner_id).await?;

        self.settled(id, changed).await
    }

    /// Delete a note for good, with its grants and attachments
    pub async fn purge(&self, principal: &Principal, id: &str) -> Result<PurgeReport> {
        let (note, _) = self.access.authorize(principal, id, Operation::Lifecycle).await?;

        tracing::info!("Permanently deleting note: {}", id);

        let stored_names = self
            .repo
            .purge_note(id, &note.owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Note not found".to_string()))?;

        release_unreferenced_blobs(&self.repo, &self.blob_store, &stored_names).await;

        tracing::info!("Note permanently deleted: {}", id);

        Ok(PurgeReport {
            note_id: id.to_string(),
            state: NoteState::Purged,
            files_removed: stored_names.len(),
        })
    }

    /// Re-read the note after a guarded transition
    async fn settled(&self, id: &str, changed: bool) -> Result<Transition> {
        let note = self
            .repo
            .find_note(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Note not found".to_string()))?;

        Ok(Transition {
            state: NoteState::of(&note),
            note,
            changed,
        })
    }
}

//! Files service
//!
//! Attachments keyed by note. Uploads write the blob durably before the
//! metadata row exists; if the row insert fails, a blob created by that
//! upload is removed again. Blobs are shared by content, so a blob is only
//! deleted once no file row references it.

use crate::access::{AccessResolver, Operation, Principal};
use crate::config::MAX_FILENAME_LENGTH;
use crate::database::{FileRecord, NewFile, Repository};
use crate::error::{AppError, Result};
use crate::storage::BlobStore;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file body together with its metadata
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub file: FileRecord,
    pub data: Vec<u8>,
}

/// Service for managing note attachments
#[derive(Clone)]
pub struct FilesService {
    repo: Repository,
    access: AccessResolver,
    blob_store: BlobStore,
    max_upload_bytes: u64,
}

impl FilesService {
    pub fn new(
        repo: Repository,
        access: AccessResolver,
        blob_store: BlobStore,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            repo,
            access,
            blob_store,
            max_upload_bytes,
        }
    }

    /// Attach a file to a note
    pub async fn upload(
        &self,
        principal: &Principal,
        note_id: &str,
        original_name: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<FileRecord> {
        self.access
            .authorize(principal, note_id, Operation::ManageFiles)
            .await?;

        if data.is_empty() {
            return Err(AppError::Validation("No file uploaded".to_string()));
        }
        if data.len() as u64 > self.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "File exceeds the {} byte upload limit",
                self.max_upload_bytes
            )));
        }

        let original_name = sanitize_filename(original_name);
        let mime_type = match mime_type.trim() {
            "" => DEFAULT_MIME_TYPE,
            other => other,
        };

        tracing::info!(
            "Uploading file: {} for note: {} (size: {} bytes)",
            original_name,
            note_id,
            data.len()
        );

        // Held until the row exists, so a concurrent release cannot count
        // zero references and delete a blob this upload just deduplicated onto
        let (blob, inserted) = {
            let _reclaim = self.blob_store.reclaim_guard().await;

            let blob = self.blob_store.write(data).await?;
            let storage_path = self
                .blob_store
                .relative_path(&blob.hash)?
                .to_string_lossy()
                .into_owned();

            let inserted = self
                .repo
                .create_file(&NewFile {
                    note_id,
                    stored_name: &blob.hash,
                    original_name: &original_name,
                    storage_path: &storage_path,
                    mime_type,
                    size: data.len() as i64,
                })
                .await;

            (blob, inserted)
        };

        match inserted {
            Ok(file) => {
                tracing::info!("File uploaded: {}", file.id);
                Ok(file)
            }
            Err(e) => {
                if blob.created {
                    tracing::warn!("File insert failed, removing blob {}: {}", blob.hash, e);
                    release_unreferenced_blobs(&self.repo, &self.blob_store, &[blob.hash]).await;
                }
                Err(e)
            }
        }
    }

    /// Files of a note the caller can read
    pub async fn list_files(&self, principal: &Principal, note_id: &str) -> Result<Vec<FileRecord>> {
        self.access.authorize(principal, note_id, Operation::Read).await?;
        self.repo.list_files(note_id).await
    }

    /// Files of a public, active note
    pub async fn list_public_files(&self, note_id: &str) -> Result<Vec<FileRecord>> {
        self.access.authorize_public(note_id).await?;
        self.repo.list_files(note_id).await
    }

    /// Download a file through the caller's capability on its note
    pub async fn download(&self, principal: &Principal, file_id: &str) -> Result<FileDownload> {
        let file = self.find_file(file_id).await?;
        self.access
            .authorize(principal, &file.note_id, Operation::Read)
            .await?;

        let data = self.blob_store.read(&file.stored_name).await?;
        Ok(FileDownload { file, data })
    }

    /// Download a file of a public, active note
    pub async fn download_public(&self, file_id: &str) -> Result<FileDownload> {
        let not_found = || AppError::NotFound("File not found".to_string());

        let file = self.repo.find_file(file_id).await?.ok_or_else(not_found)?;
        self.access
            .authorize_public(&file.note_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => not_found(),
                other => other,
            })?;

        let data = self.blob_store.read(&file.stored_name).await?;
        Ok(FileDownload { file, data })
    }

    /// Remove an attachment
    pub async fn delete_file(&self, principal: &Principal, file_id: &str) -> Result<()> {
        let file = self.find_file(file_id).await?;
        self.access
            .authorize(principal, &file.note_id, Operation::ManageFiles)
            .await?;

        tracing::info!("Deleting file: {}", file_id);

        if let Some(removed) = self.repo.delete_file(file_id).await? {
            release_unreferenced_blobs(&self.repo, &self.blob_store, &[removed.stored_name]).await;
        }

        tracing::info!("File deleted: {}", file_id);
        Ok(())
    }

    async fn find_file(&self, file_id: &str) -> Result<FileRecord> {
        self.repo
            .find_file(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))
    }
}

/// Delete each blob that no file row points at any more.
///
/// Runs after the metadata change is committed, so failures are logged
/// and leave at worst an orphaned blob.
pub(crate) async fn release_unreferenced_blobs(
    repo: &Repository,
    blob_store: &BlobStore,
    stored_names: &[String],
) {
    let _reclaim = blob_store.reclaim_guard().await;

    for name in stored_names {
        match repo.count_file_references(name).await {
            Ok(0) => {
                if let Err(e) = blob_store.delete(name).await {
                    tracing::warn!("Failed to delete blob {}: {}", name, e);
                }
            }
            Ok(_) => tracing::debug!("Blob {} still referenced, keeping it", name),
            Err(e) => tracing::warn!("Failed to count references to blob {}: {}", name, e),
        }
    }
}

/// Strip path separators and control characters, cap the length
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && !c.is_control())
        .take(MAX_FILENAME_LENGTH)
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "file".to_string(),
        name => name.to_string(),
    }
}

//! File endpoints
//!
//! Attachments are addressed by note for upload and listing, and by file
//! id for download and removal.

use super::MessageResponse;
use crate::access::Principal;
use crate::app::AppState;
use crate::database::FileRecord;
use crate::error::Result;
use crate::services::FileDownload;

/// `POST files/upload`
pub async fn upload_file(
    state: &AppState,
    principal: &Principal,
    note_id: &str,
    filename: &str,
    mime_type: &str,
    data: &[u8],
) -> Result<FileRecord> {
    state
        .files_service
        .upload(principal, note_id, filename, mime_type, data)
        .await
}

/// `GET files/note/{note_id}`
pub async fn list_files(
    state: &AppState,
    principal: &Principal,
    note_id: &str,
) -> Result<Vec<FileRecord>> {
    state.files_service.list_files(principal, note_id).await
}

/// `GET files/note/{note_id}/public`
pub async fn list_public_files(state: &AppState, note_id: &str) -> Result<Vec<FileRecord>> {
    state.files_service.list_public_files(note_id).await
}

/// `GET files/{id}`
pub async fn download_file(
    state: &AppState,
    principal: &Principal,
    file_id: &str,
) -> Result<FileDownload> {
    state.files_service.download(principal, file_id).await
}

/// `GET files/{id}/public`
pub async fn download_public_file(state: &AppState, file_id: &str) -> Result<FileDownload> {
    state.files_service.download_public(file_id).await
}

/// `DELETE files/{id}`
pub async fn delete_file(
    state: &AppState,
    principal: &Principal,
    file_id: &str,
) -> Result<MessageResponse> {
    state.files_service.delete_file(principal, file_id).await?;
    Ok(MessageResponse::new("File deleted successfully"))
}

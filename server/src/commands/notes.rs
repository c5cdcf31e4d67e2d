//! Note endpoints
//!
//! `GET notes`, `GET/POST/PUT/DELETE note/{id}`, the public link, the
//! lifecycle endpoints, favorites and collaborator management.

use super::MessageResponse;
use crate::access::Principal;
use crate::app::AppState;
use crate::database::{
    Collaborator, CreateNoteRequest, Note, NoteFilter, NoteView, PermissionGrant, ShareRequest,
    UpdateNoteRequest,
};
use crate::error::Result;
use crate::services::{PurgeReport, Transition};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteResponse {
    pub message: String,
    pub is_favorite: bool,
}

/// `GET notes?filter={all|shared|favorites|trash}`
pub async fn list_notes(
    state: &AppState,
    principal: &Principal,
    filter: Option<&str>,
) -> Result<Vec<NoteView>> {
    state
        .notes_service
        .list_notes(principal, NoteFilter::parse(filter))
        .await
}

/// `GET note/{id}`
pub async fn get_note(state: &AppState, principal: &Principal, id: &str) -> Result<NoteView> {
    state.notes_service.get_note(principal, id).await
}

/// `GET note/public/{id}`
pub async fn get_public_note(state: &AppState, id: &str) -> Result<Note> {
    state.notes_service.get_public_note(id).await
}

/// `POST note`
pub async fn create_note(
    state: &AppState,
    principal: &Principal,
    req: CreateNoteRequest,
) -> Result<Note> {
    state.notes_service.create_note(principal, req).await
}

/// `PUT note/{id}`
pub async fn update_note(
    state: &AppState,
    principal: &Principal,
    id: &str,
    req: UpdateNoteRequest,
) -> Result<Note> {
    state.notes_service.update_note(principal, id, req).await
}

/// `DELETE note/{id}` moves the note to the trash
pub async fn delete_note(state: &AppState, principal: &Principal, id: &str) -> Result<Transition> {
    state.lifecycle_service.trash(principal, id).await
}

/// `PUT note/{id}/restore`
pub async fn restore_note(state: &AppState, principal: &Principal, id: &str) -> Result<Transition> {
    state.lifecycle_service.restore(principal, id).await
}

/// `DELETE note/{id}/permanent`
pub async fn delete_note_permanent(
    state: &AppState,
    principal: &Principal,
    id: &str,
) -> Result<PurgeReport> {
    state.lifecycle_service.purge(principal, id).await
}

/// `PUT note/{id}/favorite`
pub async fn toggle_favorite(
    state: &AppState,
    principal: &Principal,
    id: &str,
) -> Result<FavoriteResponse> {
    let is_favorite = state.notes_service.toggle_favorite(principal, id).await?;

    Ok(FavoriteResponse {
        message: "Favorite status updated".to_string(),
        is_favorite,
    })
}

/// `POST note/{id}/share`
pub async fn share_note(
    state: &AppState,
    principal: &Principal,
    id: &str,
    req: ShareRequest,
) -> Result<PermissionGrant> {
    state.sharing_service.share(principal, id, &req).await
}

/// `GET note/{id}/collaborators`
pub async fn list_collaborators(
    state: &AppState,
    principal: &Principal,
    id: &str,
) -> Result<Vec<Collaborator>> {
    state.sharing_service.list_collaborators(principal, id).await
}

/// `DELETE note/{id}/collaborators/{user_id}`
pub async fn remove_collaborator(
    state: &AppState,
    principal: &Principal,
    id: &str,
    user_id: &str,
) -> Result<MessageResponse> {
    state
        .sharing_service
        .remove_collaborator(principal, id, user_id)
        .await?;

    Ok(MessageResponse::new("Collaborator removed successfully"))
}

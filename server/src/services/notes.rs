//! Notes service
//!
//! Note creation, reads, listings, content updates and the favorite flag.
//! Every call goes through the [`AccessResolver`] before touching a row.

use crate::access::{AccessResolver, Capability, Operation, Principal};
use crate::config::MAX_TITLE_LENGTH;
use crate::database::{CreateNoteRequest, Note, NoteFilter, NoteView, Repository, UpdateNoteRequest};
use crate::error::{AppError, Result};

/// Service for managing notes
#[derive(Clone)]
pub struct NotesService {
    repo: Repository,
    access: AccessResolver,
}

impl NotesService {
    pub fn new(repo: Repository, access: AccessResolver) -> Self {
        Self { repo, access }
    }

    /// Create a note owned by the caller
    pub async fn create_note(&self, principal: &Principal, mut req: CreateNoteRequest) -> Result<Note> {
        let owner_id = principal.require_user()?;
        req.title = validate_title(&req.title)?;

        tracing::info!("Creating new note for user: {}", owner_id);

        let note = self.repo.create_note(owner_id, &req).await?;

        tracing::info!("Note created successfully: {}", note.id);
        Ok(note)
    }

    /// Read a note through the caller's capability
    pub async fn get_note(&self, principal: &Principal, id: &str) -> Result<NoteView> {
        let (note, capability) = self.access.authorize(principal, id, Operation::Read).await?;

        Ok(NoteView {
            note,
            owner_name: None,
            capability,
        })
    }

    /// Read a note through its public link
    pub async fn get_public_note(&self, id: &str) -> Result<Note> {
        self.access.authorize_public(id).await
    }

    /// List the caller's notes under a filter
    pub async fn list_notes(&self, principal: &Principal, filter: NoteFilter) -> Result<Vec<NoteView>> {
        let user_id = principal.require_user()?;

        let views = match filter {
            NoteFilter::Shared => self
                .repo
                .list_shared_notes(user_id)
                .await?
                .into_iter()
                .map(|row| NoteView {
                    capability: if row.can_edit {
                        Capability::Edit
                    } else {
                        Capability::View
                    },
                    owner_name: Some(row.owner_name),
                    note: row.note,
                })
                .collect(),
            _ => self
                .repo
                .list_owned_notes(user_id, filter)
                .await?
                .into_iter()
                .map(|note| NoteView {
                    note,
                    owner_name: None,
                    capability: Capability::Own,
                })
                .collect(),
        };

        Ok(views)
    }

    /// Update title, content and visibility.
    ///
    /// Editors may write title and content; only the owner may change
    /// `is_public`. Sending the current `is_public` value unchanged is
    /// accepted from editors.
    pub async fn update_note(
        &self,
        principal: &Principal,
        id: &str,
        mut req: UpdateNoteRequest,
    ) -> Result<Note> {
        let (note, capability) = self.access.authorize(principal, id, Operation::Write).await?;
        let editor_id = principal.require_user()?;

        if let Some(is_public) = req.is_public {
            if is_public == note.is_public && !capability.is_owner() {
                req.is_public = None;
            } else if capability < Operation::ChangeVisibility.min_capability() {
                return Err(AppError::Forbidden(
                    "Only the note owner can change visibility".to_string(),
                ));
            }
        }

        if let Some(title) = &req.title {
            req.title = Some(validate_title(title)?);
        }

        tracing::debug!("Updating note: {}", id);

        match self.repo.update_note(id, editor_id, &req).await? {
            Some(updated) => {
                tracing::debug!("Note updated successfully: {}", updated.id);
                Ok(updated)
            }
            None => Err(self.vanished_or_revoked(id).await),
        }
    }

    /// Flip the owner's favorite flag, returning the new value
    pub async fn toggle_favorite(&self, principal: &Principal, id: &str) -> Result<bool> {
        let (note, _) = self
            .access
            .authorize(principal, id, Operation::ToggleFavorite)
            .await?;

        match self.repo.toggle_favorite(&note.id, &note.owner_id).await? {
            Some(is_favorite) => {
                tracing::info!("Note {} favorite: {}", id, is_favorite);
                Ok(is_favorite)
            }
            None => Err(self.vanished_or_revoked(id).await),
        }
    }

    /// Error for a guarded write that matched no row after authorization passed
    async fn vanished_or_revoked(&self, id: &str) -> AppError {
        match self.repo.find_note(id).await {
            Ok(Some(_)) => AppError::Forbidden("Access denied".to_string()),
            Ok(None) => AppError::NotFound("Note not found".to_string()),
            Err(e) => e,
        }
    }
}

/// Trim a title and check it is present and within bounds
fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();

    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }

    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, User};

    async fn create_test_service() -> (NotesService, Repository) {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        let service = NotesService::new(repo.clone(), AccessResolver::new(repo.clone()));
        (service, repo)
    }

    async fn user(repo: &Repository, name: &str) -> (User, Principal) {
        let user = repo
            .create_user(name, &format!("{}@example.com", name), "hash")
            .await
            .unwrap();
        let principal = Principal::user(&user.id);
        (user, principal)
    }

    fn draft(is_public: bool) -> CreateNoteRequest {
        CreateNoteRequest {
            title: "Draft".to_string(),
            content: "Hello".to_string(),
            is_public,
        }
    }

    #[tokio::test]
    async fn test_create_requires_title_and_user() {
        let (service, repo) = create_test_service().await;
        let (_, alice) = user(&repo, "alice").await;

        let result = service
            .create_note(
                &alice,
                CreateNoteRequest {
                    title: "   ".to_string(),
                    content: String::new(),
                    is_public: false,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = service.create_note(&Principal::Anonymous, draft(false)).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_get_note_not_found_vs_forbidden() {
        let (service, repo) = create_test_service().await;
        let (_, alice) = user(&repo, "alice").await;
        let (_, bob) = user(&repo, "bob").await;
        let note = service.create_note(&alice, draft(false)).await.unwrap();

        let view = service.get_note(&alice, &note.id).await.unwrap();
        assert_eq!(view.capability, Capability::Own);

        assert!(matches!(
            service.get_note(&bob, &note.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.get_note(&bob, "missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_public_note_readable_by_strangers() {
        let (service, repo) = create_test_service().await;
        let (_, alice) = user(&repo, "alice").await;
        let (_, bob) = user(&repo, "bob").await;
        let note = service.create_note(&alice, draft(true)).await.unwrap();

        let view = service.get_note(&bob, &note.id).await.unwrap();
        assert_eq!(view.capability, Capability::PublicView);

        let public = service.get_public_note(&note.id).await.unwrap();
        assert_eq!(public.id, note.id);
    }

    #[tokio::test]
    async fn test_public_endpoint_masks_private_notes() {
        let (service, repo) = create_test_service().await;
        let (_, alice) = user(&repo, "alice").await;
        let note = service.create_note(&alice, draft(false)).await.unwrap();

        assert!(matches!(
            service.get_public_note(&note.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.get_public_note("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_editor_cannot_change_visibility() {
        let (service, repo) = create_test_service().await;
        let (alice_user, alice) = user(&repo, "alice").await;
        let (bob_user, bob) = user(&repo, "bob").await;
        let note = service.create_note(&alice, draft(false)).await.unwrap();
        repo.upsert_grant(&note.id, &alice_user.id, &bob_user.id, true)
            .await
            .unwrap();

        let result = service
            .update_note(
                &bob,
                &note.id,
                UpdateNoteRequest {
                    is_public: Some(true),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        // Echoing the current value is fine
        let updated = service
            .update_note(
                &bob,
                &note.id,
                UpdateNoteRequest {
                    title: Some("Edited".to_string()),
                    content: Some("Body".to_string()),
                    is_public: Some(false),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Edited");
        assert!(!updated.is_public);

        let updated = service
            .update_note(
                &alice,
                &note.id,
                UpdateNoteRequest {
                    is_public: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_public);
    }

    #[tokio::test]
    async fn test_viewer_cannot_edit() {
        let (service, repo) = create_test_service().await;
        let (alice_user, alice) = user(&repo, "alice").await;
        let (bob_user, bob) = user(&repo, "bob").await;
        let note = service.create_note(&alice, draft(false)).await.unwrap();
        repo.upsert_grant(&note.id, &alice_user.id, &bob_user.id, false)
            .await
            .unwrap();

        let result = service
            .update_note(
                &bob,
                &note.id,
                UpdateNoteRequest {
                    title: Some("Nope".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_toggle_favorite_owner_only() {
        let (service, repo) = create_test_service().await;
        let (alice_user, alice) = user(&repo, "alice").await;
        let (bob_user, bob) = user(&repo, "bob").await;
        let note = service.create_note(&alice, draft(false)).await.unwrap();
        repo.upsert_grant(&note.id, &alice_user.id, &bob_user.id, true)
            .await
            .unwrap();

        assert!(service.toggle_favorite(&alice, &note.id).await.unwrap());
        assert!(matches!(
            service.toggle_favorite(&bob, &note.id).await,
            Err(AppError::Forbidden(_))
        ));

        let favorites = service.list_notes(&alice, NoteFilter::Favorites).await.unwrap();
        assert_eq!(favorites.len(), 1);

        assert!(!service.toggle_favorite(&alice, &note.id).await.unwrap());
        let favorites = service.list_notes(&alice, NoteFilter::Favorites).await.unwrap();
        assert!(favorites.is_empty());
    }

    #[tokio::test]
    async fn test_shared_listing_capabilities() {
        let (service, repo) = create_test_service().await;
        let (alice_user, alice) = user(&repo, "alice").await;
        let (bob_user, bob) = user(&repo, "bob").await;

        let viewable = service.create_note(&alice, draft(false)).await.unwrap();
        let editable = service.create_note(&alice, draft(false)).await.unwrap();
        repo.upsert_grant(&viewable.id, &alice_user.id, &bob_user.id, false)
            .await
            .unwrap();
        repo.upsert_grant(&editable.id, &alice_user.id, &bob_user.id, true)
            .await
            .unwrap();

        let shared = service.list_notes(&bob, NoteFilter::Shared).await.unwrap();
        assert_eq!(shared.len(), 2);
        for view in &shared {
            assert_eq!(view.owner_name.as_deref(), Some("alice"));
            let expected = if view.note.id == editable.id {
                Capability::Edit
            } else {
                Capability::View
            };
            assert_eq!(view.capability, expected);
        }

        assert!(service.list_notes(&bob, NoteFilter::All).await.unwrap().is_empty());
        assert!(matches!(
            service.list_notes(&Principal::Anonymous, NoteFilter::All).await,
            Err(AppError::Forbidden(_))
        ));
    }
}

//! Sharing service
//!
//! Owner-only management of collaborator grants. A grant is keyed by
//! `(note, user)`; sharing again with the same user rewrites `can_edit`.

use crate::access::{AccessResolver, Operation, Principal};
use crate::database::{Collaborator, PermissionGrant, Repository, ShareRequest};
use crate::error::{AppError, Result};
use crate::services::users::normalize_email;

/// Service for note collaborators
#[derive(Clone)]
pub struct SharingService {
    repo: Repository,
    access: AccessResolver,
}

impl SharingService {
    pub fn new(repo: Repository, access: AccessResolver) -> Self {
        Self { repo, access }
    }

    /// Grant the user behind `target_email` view or edit access
    pub async fn share(
        &self,
        principal: &Principal,
        note_id: &str,
        req: &ShareRequest,
    ) -> Result<PermissionGrant> {
        let (note, _) = self.access.authorize(principal, note_id, Operation::Share).await?;

        let email = normalize_email(&req.target_email);
        if email.is_empty() {
            return Err(AppError::Validation("Target email is required".to_string()));
        }
        if note.is_trashed() {
            return Err(AppError::Validation(
                "Cannot share a note that is in the trash".to_string(),
            ));
        }

        let target = self
            .repo
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if target.id == note.owner_id {
            return Err(AppError::Validation(
                "Cannot share a note with its owner".to_string(),
            ));
        }

        let grant = match self
            .repo
            .upsert_grant(&note.id, &note.owner_id, &target.id, req.can_edit)
            .await?
        {
            Some(grant) => grant,
            // Trashed, purged or transferred between the check and the write
            None => {
                return Err(match self.repo.find_note(note_id).await? {
                    None => AppError::NotFound("Note not found".to_string()),
                    Some(current) if current.is_trashed() => AppError::Validation(
                        "Cannot share a note that is in the trash".to_string(),
                    ),
                    Some(_) => AppError::Forbidden("Only the note owner can do this".to_string()),
                })
            }
        };

        tracing::info!(
            "Shared note {} with user {} (can_edit: {})",
            note_id,
            target.id,
            grant.can_edit
        );
        Ok(grant)
    }

    /// Revoke a collaborator's grant
    pub async fn remove_collaborator(
        &self,
        principal: &Principal,
        note_id: &str,
        user_id: &str,
    ) -> Result<()> {
        self.access.authorize(principal, note_id, Operation::Share).await?;

        if !self.repo.delete_grant(note_id, user_id).await? {
            return Err(AppError::NotFound("Collaborator not found".to_string()));
        }

        tracing::info!("Removed collaborator {} from note {}", user_id, note_id);
        Ok(())
    }

    /// Collaborators in the order they were first added
    pub async fn list_collaborators(
        &self,
        principal: &Principal,
        note_id: &str,
    ) -> Result<Vec<Collaborator>> {
        self.access.authorize(principal, note_id, Operation::Share).await?;
        self.repo.list_collaborators(note_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Capability;
    use crate::database::{create_memory_pool, CreateNoteRequest, Note};
    use chrono::Utc;

    struct Fixture {
        service: SharingService,
        access: AccessResolver,
        repo: Repository,
        alice: Principal,
        bob: Principal,
        bob_id: String,
        note: Note,
    }

    async fn fixture() -> Fixture {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        let access = AccessResolver::new(repo.clone());

        let alice = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();
        let bob = repo.create_user("bob", "bob@example.com", "hash").await.unwrap();
        let note = repo
            .create_note(
                &alice.id,
                &CreateNoteRequest {
                    title: "Draft".to_string(),
                    content: String::new(),
                    is_public: false,
                },
            )
            .await
            .unwrap();

        Fixture {
            service: SharingService::new(repo.clone(), access.clone()),
            access,
            repo,
            alice: Principal::user(&alice.id),
            bob: Principal::user(&bob.id),
            bob_id: bob.id,
            note,
        }
    }

    fn share_with(email: &str, can_edit: bool) -> ShareRequest {
        ShareRequest {
            target_email: email.to_string(),
            can_edit,
        }
    }

    #[tokio::test]
    async fn test_share_then_update_grant() {
        let fx = fixture().await;

        fx.service
            .share(&fx.alice, &fx.note.id, &share_with("bob@example.com", true))
            .await
            .unwrap();
        let note = fx.repo.find_note(&fx.note.id).await.unwrap().unwrap();
        assert_eq!(fx.access.capability(&fx.bob, &note).await.unwrap(), Capability::Edit);

        fx.service
            .share(&fx.alice, &fx.note.id, &share_with("BOB@example.com", false))
            .await
            .unwrap();
        assert_eq!(fx.access.capability(&fx.bob, &note).await.unwrap(), Capability::View);
        assert_eq!(fx.repo.count_grants(&fx.note.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_share_errors() {
        let fx = fixture().await;

        assert!(matches!(
            fx.service
                .share(&fx.alice, &fx.note.id, &share_with("nobody@example.com", false))
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.share(&fx.alice, &fx.note.id, &share_with("  ", false)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            fx.service
                .share(&fx.alice, &fx.note.id, &share_with("alice@example.com", true))
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            fx.service
                .share(&fx.bob, &fx.note.id, &share_with("bob@example.com", true))
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_collaborator_cannot_reshare() {
        let fx = fixture().await;
        fx.service
            .share(&fx.alice, &fx.note.id, &share_with("bob@example.com", true))
            .await
            .unwrap();
        fx.repo
            .create_user("carol", "carol@example.com", "hash")
            .await
            .unwrap();

        assert!(matches!(
            fx.service
                .share(&fx.bob, &fx.note.id, &share_with("carol@example.com", true))
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            fx.service.list_collaborators(&fx.bob, &fx.note.id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_trashed_note_not_shareable_but_grants_kept() {
        let fx = fixture().await;
        fx.service
            .share(&fx.alice, &fx.note.id, &share_with("bob@example.com", true))
            .await
            .unwrap();
        fx.repo
            .create_user("carol", "carol@example.com", "hash")
            .await
            .unwrap();

        let alice_id = fx.alice.user_id().unwrap().to_string();
        fx.repo.trash_note(&fx.note.id, &alice_id, Utc::now()).await.unwrap();

        assert!(matches!(
            fx.service
                .share(&fx.alice, &fx.note.id, &share_with("carol@example.com", false))
                .await,
            Err(AppError::Validation(_))
        ));

        let collaborators = fx.service.list_collaborators(&fx.alice, &fx.note.id).await.unwrap();
        assert_eq!(collaborators.len(), 1);
        assert_eq!(collaborators[0].user_id, fx.bob_id);
    }

    #[tokio::test]
    async fn test_remove_collaborator() {
        let fx = fixture().await;
        fx.service
            .share(&fx.alice, &fx.note.id, &share_with("bob@example.com", false))
            .await
            .unwrap();

        let collaborators = fx.service.list_collaborators(&fx.alice, &fx.note.id).await.unwrap();
        assert_eq!(collaborators[0].email, "bob@example.com");
        assert_eq!(collaborators[0].username, "bob");

        fx.service
            .remove_collaborator(&fx.alice, &fx.note.id, &fx.bob_id)
            .await
            .unwrap();
        assert!(matches!(
            fx.service.remove_collaborator(&fx.alice, &fx.note.id, &fx.bob_id).await,
            Err(AppError::NotFound(_))
        ));

        let note = fx.repo.find_note(&fx.note.id).await.unwrap().unwrap();
        assert_eq!(fx.access.capability(&fx.bob, &note).await.unwrap(), Capability::None);
    }
}

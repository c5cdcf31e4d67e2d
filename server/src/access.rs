//! Access resolution for notes
//!
//! Every note operation asks one question: what can this principal do with
//! this note? [`resolve`] answers it from three facts (ownership, the
//! caller's grant row, the public flag) and [`AccessResolver`] loads those
//! facts and turns the answer into an allow/deny for an [`Operation`].
//!
//! Resolution order, first match wins:
//!
//! 1. owner → `Own`, trashed or not
//! 2. grant row → `Edit` or `View`
//! 3. public and not trashed → `PublicView`
//! 4. otherwise → `None`
//!
//! Anonymous principals skip steps 1 and 2 entirely.

use crate::database::{Note, PermissionGrant, Repository};
use crate::error::{AppError, Result};
use serde::Serialize;

/// Effective access level, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    None,
    PublicView,
    View,
    Edit,
    Own,
}

impl Capability {
    pub fn can_read(self) -> bool {
        self >= Capability::PublicView
    }

    pub fn can_write(self) -> bool {
        self >= Capability::Edit
    }

    pub fn is_owner(self) -> bool {
        self == Capability::Own
    }
}

/// Who is asking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(String),
}

impl Principal {
    pub fn user(id: impl Into<String>) -> Self {
        Principal::User(id.into())
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Principal::User(id) => Some(id),
            Principal::Anonymous => None,
        }
    }

    /// The user id, or `Forbidden` for anonymous callers
    pub fn require_user(&self) -> Result<&str> {
        self.user_id()
            .ok_or_else(|| AppError::Forbidden("Authentication required".to_string()))
    }
}

/// Note operations and the capability each one needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    ManageFiles,
    ToggleFavorite,
    ChangeVisibility,
    Lifecycle,
    Share,
}

impl Operation {
    pub fn min_capability(self) -> Capability {
        match self {
            Operation::Read => Capability::PublicView,
            Operation::Write | Operation::ManageFiles => Capability::Edit,
            Operation::ToggleFavorite
            | Operation::ChangeVisibility
            | Operation::Lifecycle
            | Operation::Share => Capability::Own,
        }
    }

    fn denial(self) -> &'static str {
        match self {
            Operation::Read => "Access denied",
            Operation::Write | Operation::ManageFiles => "You do not have edit access to this note",
            Operation::ToggleFavorite
            | Operation::ChangeVisibility
            | Operation::Lifecycle
            | Operation::Share => "Only the note owner can do this",
        }
    }
}

/// Compute the capability of `principal` over `note`.
///
/// `grant` must be the grant row for `(note.id, principal)` if one exists.
/// It is ignored for anonymous principals.
pub fn resolve(principal: &Principal, note: &Note, grant: Option<&PermissionGrant>) -> Capability {
    if let Principal::User(user_id) = principal {
        if *user_id == note.owner_id {
            return Capability::Own;
        }

        if let Some(grant) = grant.filter(|g| g.note_id == note.id && g.user_id == *user_id) {
            return if grant.can_edit {
                Capability::Edit
            } else {
                Capability::View
            };
        }
    }

    resolve_public(note)
}

/// Resolution for callers that are never matched against owner or grants
pub fn resolve_public(note: &Note) -> Capability {
    if note.is_public && !note.is_trashed() {
        Capability::PublicView
    } else {
        Capability::None
    }
}

/// Loads the facts `resolve` needs and enforces operation minimums
#[derive(Clone)]
pub struct AccessResolver {
    repo: Repository,
}

impl AccessResolver {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Capability of `principal` over an already loaded note
    pub async fn capability(&self, principal: &Principal, note: &Note) -> Result<Capability> {
        let grant = match principal {
            Principal::User(user_id) if *user_id != note.owner_id => {
                self.repo.find_grant(&note.id, user_id).await?
            }
            _ => None,
        };

        Ok(resolve(principal, note, grant.as_ref()))
    }

    /// Load a note and check `principal` may perform `operation` on it.
    ///
    /// Missing notes are `NotFound`; existing notes with too little
    /// capability are `Forbidden`.
    pub async fn authorize(
        &self,
        principal: &Principal,
        note_id: &str,
        operation: Operation,
    ) -> Result<(Note, Capability)> {
        let note = self
            .repo
            .find_note(note_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Note not found".to_string()))?;

        let capability = self.capability(principal, &note).await?;

        if capability < operation.min_capability() {
            tracing::warn!(
                "Denied {:?} on note {} (capability: {:?})",
                operation,
                note_id,
                capability
            );
            return Err(AppError::Forbidden(operation.denial().to_string()));
        }

        Ok((note, capability))
    }

    /// Public-link authorization: anything short of `PublicView` reads as
    /// `NotFound`, so private notes are indistinguishable from missing ones.
    pub async fn authorize_public(&self, note_id: &str) -> Result<Note> {
        let note = self
            .repo
            .find_note(note_id)
            .await?
            .filter(|note| resolve_public(note) == Capability::PublicView)
            .ok_or_else(|| AppError::NotFound("Note not found or not public".to_string()))?;

        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn note(owner: &str, is_public: bool, trashed: bool) -> Note {
        let now = Utc::now();
        Note {
            id: "n1".to_string(),
            owner_id: owner.to_string(),
            title: "Draft".to_string(),
            content: String::new(),
            is_public,
            is_favorite: false,
            created_at: now,
            updated_at: now,
            deleted_at: trashed.then_some(now),
        }
    }

    fn grant(user: &str, can_edit: bool) -> PermissionGrant {
        PermissionGrant {
            id: "g1".to_string(),
            note_id: "n1".to_string(),
            user_id: user.to_string(),
            can_edit,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_always_owns() {
        for (is_public, trashed) in [(false, false), (true, false), (false, true), (true, true)] {
            let n = note("alice", is_public, trashed);
            assert_eq!(resolve(&Principal::user("alice"), &n, None), Capability::Own);
        }
    }

    #[test]
    fn test_grant_levels() {
        let n = note("alice", false, false);
        let bob = Principal::user("bob");

        assert_eq!(resolve(&bob, &n, Some(&grant("bob", true))), Capability::Edit);
        assert_eq!(resolve(&bob, &n, Some(&grant("bob", false))), Capability::View);
        assert_eq!(resolve(&bob, &n, None), Capability::None);
    }

    #[test]
    fn test_grant_for_someone_else_is_ignored() {
        let n = note("alice", false, false);
        let carol = Principal::user("carol");

        assert_eq!(resolve(&carol, &n, Some(&grant("bob", true))), Capability::None);
    }

    #[test]
    fn test_grant_beats_public_flag() {
        let n = note("alice", true, false);
        let bob = Principal::user("bob");

        assert_eq!(resolve(&bob, &n, Some(&grant("bob", false))), Capability::View);
        assert_eq!(resolve(&bob, &n, None), Capability::PublicView);
    }

    #[test]
    fn test_grants_survive_trash() {
        let n = note("alice", false, true);
        let bob = Principal::user("bob");

        assert_eq!(resolve(&bob, &n, Some(&grant("bob", true))), Capability::Edit);
    }

    #[test]
    fn test_anonymous_only_sees_public_active_notes() {
        let anon = Principal::Anonymous;

        assert_eq!(resolve(&anon, &note("alice", true, false), None), Capability::PublicView);
        assert_eq!(resolve(&anon, &note("alice", true, true), None), Capability::None);
        assert_eq!(resolve(&anon, &note("alice", false, false), None), Capability::None);
    }

    #[test]
    fn test_anonymous_never_matches_grants() {
        let anon = Principal::Anonymous;
        let n = note("alice", false, false);

        assert_eq!(resolve(&anon, &n, Some(&grant("bob", true))), Capability::None);
    }

    #[test]
    fn test_capability_ordering() {
        assert!(Capability::Own > Capability::Edit);
        assert!(Capability::Edit > Capability::View);
        assert!(Capability::View > Capability::PublicView);
        assert!(Capability::PublicView > Capability::None);

        assert!(Capability::PublicView.can_read());
        assert!(!Capability::None.can_read());
        assert!(Capability::Edit.can_write());
        assert!(!Capability::View.can_write());
        assert!(!Capability::Edit.is_owner());
    }

    #[test]
    fn test_operation_minimums() {
        assert_eq!(Operation::Read.min_capability(), Capability::PublicView);
        assert_eq!(Operation::Write.min_capability(), Capability::Edit);
        assert_eq!(Operation::ManageFiles.min_capability(), Capability::Edit);
        assert_eq!(Operation::ToggleFavorite.min_capability(), Capability::Own);
        assert_eq!(Operation::ChangeVisibility.min_capability(), Capability::Own);
        assert_eq!(Operation::Lifecycle.min_capability(), Capability::Own);
        assert_eq!(Operation::Share.min_capability(), Capability::Own);
    }
}

//! Services module
//!
//! Business logic services that coordinate between commands and repository.

pub mod files;
pub mod lifecycle;
pub mod notes;
pub mod sharing;
pub mod users;

pub use files::{FileDownload, FilesService};
pub use lifecycle::{LifecycleService, NoteState, PurgeReport, Transition};
pub use notes::NotesService;
pub use sharing::SharingService;
pub use users::UsersService;

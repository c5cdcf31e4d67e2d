//! Request handlers
//!
//! One function per API endpoint, independent of the transport that calls
//! them. Each takes the shared [`AppState`] plus the caller's [`Principal`]
//! and returns either a serializable payload or an [`AppError`](crate::error::AppError)
//! carrying its status and code.
//!
//! - `notes`: note CRUD, listings, lifecycle, favorites and sharing
//! - `files`: attachment upload, listing, download and removal
//! - `users`: registration and login

pub mod files;
pub mod notes;
pub mod users;

use crate::app::AppState;
use serde::Serialize;

pub use files::*;
pub use notes::*;
pub use users::*;

/// Plain acknowledgement body
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Application information structure
#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    pub version: String,
    pub max_upload_bytes: u64,
}

/// Get application information
pub fn get_app_info(state: &AppState) -> AppInfo {
    AppInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        max_upload_bytes: state.config.max_upload_bytes,
    }
}

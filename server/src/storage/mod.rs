//! Storage module
//!
//! Provides blob storage for uploaded file bodies.

pub mod blob_store;

pub use blob_store::{BlobStore, StoredBlob};

//! Content-addressed blob storage
//!
//! Stores uploaded file bodies using their SHA-256 hash as key.
//! Files are organized in a two-level directory structure.
//!
//! Example: hash "abcd1234..." is stored at "blobs/ab/cd/abcd1234..."

use crate::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};

/// Outcome of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub hash: String,
    /// False when identical content was already present
    pub created: bool,
}

/// Content-addressed blob store
///
/// Clones share one reclaim lock. Anything that records a new reference to
/// a blob, or deletes a blob after counting its references, holds it.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
    reclaim: Arc<Mutex<()>>,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            reclaim: Arc::new(Mutex::new(())),
        }
    }

    /// Serialize reference bookkeeping against blob deletion
    pub async fn reclaim_guard(&self) -> MutexGuard<'_, ()> {
        self.reclaim.lock().await
    }

    /// Create the root directory if needed
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("Blob store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Write data durably and return its hash.
    ///
    /// Data goes to a temp file, is synced, then renamed into place, so a
    /// returned hash always names a complete file.
    pub async fn write(&self, data: &[u8]) -> Result<StoredBlob> {
        let hash = calculate_hash(data);
        let path = self.get_path(&hash)?;

        if fs::try_exists(&path).await? {
            tracing::debug!("Blob already exists: {}", hash);
            return Ok(StoredBlob {
                hash,
                created: false,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Wrote blob: {} ({} bytes)", hash, data.len());

        Ok(StoredBlob {
            hash,
            created: true,
        })
    }

    pub async fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.get_path(hash)?;

        if !fs::try_exists(&path).await? {
            return Err(AppError::BlobStore(format!("Blob not found: {}", hash)));
        }

        let data = fs::read(&path).await?;
        tracing::debug!("Read blob: {} ({} bytes)", hash, data.len());

        Ok(data)
    }

    pub async fn exists(&self, hash: &str) -> Result<bool> {
        match self.get_path(hash) {
            Ok(path) => Ok(fs::try_exists(&path).await?),
            Err(_) => Ok(false),
        }
    }

    /// Delete a blob. Deleting a missing blob succeeds.
    pub async fn delete(&self, hash: &str) -> Result<()> {
        let path = self.get_path(hash)?;

        if !fs::try_exists(&path).await? {
            return Ok(());
        }

        fs::remove_file(&path).await?;
        tracing::debug!("Deleted blob: {}", hash);

        Ok(())
    }

    /// Path of a blob relative to the store root
    pub fn relative_path(&self, hash: &str) -> Result<PathBuf> {
        validate_hash(hash)?;
        Ok(Path::new(&hash[0..2]).join(&hash[2..4]).join(hash))
    }

    fn get_path(&self, hash: &str) -> Result<PathBuf> {
        Ok(self.root.join(self.relative_path(hash)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Hashes are 64 lowercase hex chars; anything else never touches the filesystem
fn validate_hash(hash: &str) -> Result<()> {
    if hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(AppError::BlobStore(format!("Invalid blob hash: {}", hash)))
    }
}

fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

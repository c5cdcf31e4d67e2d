//! Server configuration
//!
//! Validation limits used throughout the service layer, plus the
//! file-backed `ServerConfig` read at startup.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

// ===== Validation Limits =====

/// Maximum length of a note title in characters
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum length of a stored original filename
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Default upload size limit (5 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

// ===== Server Configuration =====

/// Process configuration. Every field has a default so partial files load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_database_file")]
    pub database_file: String,
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_database_file() -> String {
    "notes.db".to_string()
}

fn default_blob_dir() -> String {
    "blobs".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_log_filter() -> String {
    "noteshare=debug,info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            blob_dir: default_blob_dir(),
            max_connections: default_max_connections(),
            max_upload_bytes: default_max_upload_bytes(),
            log_filter: default_log_filter(),
        }
    }
}

impl ServerConfig {
    /// Defaults rooted at `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file, writing the defaults if it does not exist
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file not found at {:?}, writing defaults", path);
            let default = Self::default();
            default.save(path).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(path).await?;
        let config: ServerConfig = serde_json::from_str(&content)
            .map_err(|e| AppError::Validation(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        tracing::info!("Config saved to {:?}", path);

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(AppError::Validation(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(AppError::Validation(
                "max_upload_bytes must be greater than 0".to_string(),
            ));
        }
        if self.database_file.trim().is_empty() {
            return Err(AppError::Validation("database_file is required".to_string()));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn blob_path(&self) -> PathBuf {
        self.data_dir.join(&self.blob_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_default_config_written_on_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");

        let config = ServerConfig::load(&path).await.unwrap();

        assert!(path.exists());
        assert_eq!(config.database_file, "notes.db");
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[tokio::test]
    async fn test_partial_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "max_connections": 2 }"#).await.unwrap();

        let config = ServerConfig::load(&path).await.unwrap();

        assert_eq!(config.max_connections, 2);
        assert_eq!(config.blob_dir, "blobs");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{ "max_upload_bytes": 0 }"#).await.unwrap();

        let result = ServerConfig::load(&path).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_paths_rooted_at_data_dir() {
        let config = ServerConfig::in_dir("/srv/notes");

        assert_eq!(config.database_path(), PathBuf::from("/srv/notes/notes.db"));
        assert_eq!(config.blob_path(), PathBuf::from("/srv/notes/blobs"));
    }
}

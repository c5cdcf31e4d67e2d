//! Application state and initialization
//!
//! `AppState` owns the process-wide store handle. It is opened once at
//! startup, handed to every command by reference, and closed at shutdown.
//! Services receive their repository and blob store through their
//! constructors and never reach for a global.

use crate::access::AccessResolver;
use crate::config::ServerConfig;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{FilesService, LifecycleService, NotesService, SharingService, UsersService};
use crate::storage::BlobStore;
use sqlx::SqlitePool;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub access: AccessResolver,
    pub notes_service: NotesService,
    pub lifecycle_service: LifecycleService,
    pub sharing_service: SharingService,
    pub files_service: FilesService,
    pub users_service: UsersService,
    repo: Repository,
    pool: SqlitePool,
}

impl AppState {
    /// Open the database and blob store described by `config`
    pub async fn open(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        tracing::info!("Initializing application in {:?}", config.data_dir);

        tokio::fs::create_dir_all(&config.data_dir).await?;

        let pool = create_pool(&config.database_path(), config.max_connections).await?;

        let blob_store = BlobStore::new(config.blob_path());
        blob_store.initialize().await?;

        let state = Self::from_parts(config, pool, blob_store);

        tracing::info!("Application initialized successfully");
        Ok(state)
    }

    /// Wire services around an existing pool and blob store
    pub fn from_parts(config: ServerConfig, pool: SqlitePool, blob_store: BlobStore) -> Self {
        let repo = Repository::new(pool.clone());
        let access = AccessResolver::new(repo.clone());

        Self {
            notes_service: NotesService::new(repo.clone(), access.clone()),
            lifecycle_service: LifecycleService::new(
                repo.clone(),
                access.clone(),
                blob_store.clone(),
            ),
            sharing_service: SharingService::new(repo.clone(), access.clone()),
            files_service: FilesService::new(
                repo.clone(),
                access.clone(),
                blob_store,
                config.max_upload_bytes,
            ),
            users_service: UsersService::new(repo.clone()),
            repo,
            access,
            config,
            pool,
        }
    }

    /// Direct repository access for maintenance and inspection
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Release the store handle. In-flight queries finish first.
    pub async fn close(self) {
        tracing::info!("Closing database pool");
        self.pool.close().await;
    }
}

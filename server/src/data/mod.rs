//! Data storage layer
//!
//! - `sqlite` / `postgres` - Record stores implementing the repository traits
//! - `cache` - Byte-level cache backends (moka, Redis) behind `BaseCache`
//! - `cached` - Cache-aside wrappers over the record repositories
//! - `files` - Static file store (filesystem or S3)
//! - `repository` - One repository trait per entity
//! - `types` - Identifiers and entities shared by every backend
//! - `error` - Error taxonomy for the whole layer
//!
//! [`Repositories`] assembles the full set: notifications straight from the
//! record store, every other entity behind its cache-aside wrapper.

pub mod cache;
pub mod cached;
pub mod error;
pub mod files;
pub mod postgres;
pub mod repository;
pub mod sqlite;
pub mod types;

pub use error::{ConfigError, DataError, ErrorKind, RecordOp, RepositoryError};
pub use postgres::PostgresService;
pub use sqlite::SqliteService;

use std::sync::Arc;

use crate::core::config::{DatabaseBackend, DatabaseConfig};
use cache::BaseCache;
use cached::{
    CachedAssignmentRepository, CachedCommentRepository, CachedNamespaceRepository,
    CachedPermissionRepository, CachedProjectRepository, CachedRoleRepository,
};
use repository::{
    AssignmentRepository, CommentRepository, NamespaceRepository, NotificationRepository,
    PermissionRepository, ProjectRepository, RoleRepository,
};
use types::ResourceType;

/// Record store service
///
/// Wraps the backend-specific service. Services are stored as Arc so the
/// repositories can share them.
pub enum RecordStore {
    /// SQLite backend (default, embedded)
    Sqlite(Arc<SqliteService>),
    /// PostgreSQL backend (for multi-instance deployments)
    Postgres(Arc<PostgresService>),
}

impl RecordStore {
    /// Open and migrate the configured backend
    pub async fn init(config: &DatabaseConfig) -> Result<Self, DataError> {
        match config.backend {
            DatabaseBackend::Sqlite => {
                let service = SqliteService::init(&config.sqlite_path).await?;
                Ok(Self::Sqlite(Arc::new(service)))
            }
            DatabaseBackend::Postgres => {
                let pg = config.postgres.as_ref().ok_or_else(|| {
                    DataError::Config("PostgreSQL configuration required".to_string())
                })?;
                let service = PostgresService::init(pg).await?;
                Ok(Self::Postgres(Arc::new(service)))
            }
        }
    }

    pub fn backend(&self) -> DatabaseBackend {
        match self {
            Self::Sqlite(_) => DatabaseBackend::Sqlite,
            Self::Postgres(_) => DatabaseBackend::Postgres,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
        }
    }

    /// The SQLite service, or `InvalidDatabase` on another backend
    pub fn sqlite(&self) -> Result<&Arc<SqliteService>, ConfigError> {
        match self {
            Self::Sqlite(s) => Ok(s),
            _ => Err(ConfigError::InvalidDatabase {
                expected: "sqlite",
                found: self.name(),
            }),
        }
    }

    /// The PostgreSQL service, or `InvalidDatabase` on another backend
    pub fn postgres(&self) -> Result<&Arc<PostgresService>, ConfigError> {
        match self {
            Self::Postgres(p) => Ok(p),
            _ => Err(ConfigError::InvalidDatabase {
                expected: "postgres",
                found: self.name(),
            }),
        }
    }

    pub async fn health_check(&self) -> Result<(), DataError> {
        match self {
            Self::Sqlite(s) => s.health_check().await.map_err(Into::into),
            Self::Postgres(p) => p.health_check().await.map_err(Into::into),
        }
    }

    /// Close the database connection gracefully
    pub async fn close(&self) {
        match self {
            Self::Sqlite(s) => s.close().await,
            Self::Postgres(p) => p.close().await,
        }
    }
}

/// Every entity repository, wired for use by service code
pub struct Repositories {
    pub assignments: Arc<dyn AssignmentRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub namespaces: Arc<dyn NamespaceRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub roles: Arc<dyn RoleRepository>,
}

impl Repositories {
    pub fn builder() -> RepositoriesBuilder {
        RepositoriesBuilder::default()
    }

    fn wrap<S>(store: Arc<S>, cache: Arc<BaseCache>, cached_resource_types: Vec<ResourceType>) -> Self
    where
        S: AssignmentRepository
            + CommentRepository
            + NamespaceRepository
            + NotificationRepository
            + PermissionRepository
            + ProjectRepository
            + RoleRepository
            + 'static,
    {
        Self {
            assignments: Arc::new(CachedAssignmentRepository::new(
                store.clone(),
                cache.clone(),
                cached_resource_types,
            )),
            comments: Arc::new(CachedCommentRepository::new(store.clone(), cache.clone())),
            namespaces: Arc::new(CachedNamespaceRepository::new(store.clone(), cache.clone())),
            notifications: store.clone(),
            permissions: Arc::new(CachedPermissionRepository::new(store.clone(), cache.clone())),
            projects: Arc::new(CachedProjectRepository::new(store.clone(), cache.clone())),
            roles: Arc::new(CachedRoleRepository::new(store, cache)),
        }
    }
}

pub struct RepositoriesBuilder {
    store: Option<Arc<RecordStore>>,
    cache: Option<Arc<BaseCache>>,
    cached_resource_types: Vec<ResourceType>,
}

impl Default for RepositoriesBuilder {
    fn default() -> Self {
        Self {
            store: None,
            cache: None,
            cached_resource_types: vec![ResourceType::Issue],
        }
    }
}

impl RepositoriesBuilder {
    pub fn store(mut self, store: Arc<RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<BaseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resource types whose cached reads are flushed on assignment create
    ///
    /// Defaults to `[Issue]`; an empty list is rejected by `build`.
    pub fn cached_resource_types(mut self, types: Vec<ResourceType>) -> Self {
        self.cached_resource_types = types;
        self
    }

    pub fn build(self) -> Result<Repositories, ConfigError> {
        let store = self.store.ok_or(ConfigError::InvalidRepository)?;
        let cache = self.cache.ok_or(ConfigError::NoClient)?;
        if self.cached_resource_types.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "cached_resource_types must list at least one type".to_string(),
            ));
        }

        let repositories = match store.as_ref() {
            RecordStore::Sqlite(s) => {
                Repositories::wrap(s.clone(), cache, self.cached_resource_types)
            }
            RecordStore::Postgres(p) => {
                Repositories::wrap(p.clone(), cache, self.cached_resource_types)
            }
        };
        tracing::debug!(backend = store.name(), "Repositories initialized");
        Ok(repositories)
    }
}

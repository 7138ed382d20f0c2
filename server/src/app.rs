//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::cli::{self, CacheCommands, CliConfig, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{DEFAULT_LOG_FILTER, ENV_LOG};
use crate::data::cache::{BaseCache, CacheKey};
use crate::data::files::{self, StaticFileStore};
use crate::data::{ConfigError, RecordStore, Repositories};

pub struct CoreApp {
    pub config: AppConfig,
    pub store: Arc<RecordStore>,
    pub cache: Arc<BaseCache>,
    pub files: Arc<dyn StaticFileStore>,
    pub repositories: Repositories,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging()?;

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Commands::Check => {
                let app = Self::init(&cli_config).await?;
                let result = app.check().await;
                app.store.close().await;
                result
            }
            Commands::Migrate => Self::migrate(&cli_config).await,
            Commands::Cache { command } => Self::handle_cache_command(&cli_config, command).await,
        }
    }

    /// Connect every backend and wire the repositories
    pub async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let cache = Arc::new(
            BaseCache::from_config(&config.cache)
                .await
                .context("Failed to initialize cache")?,
        );
        tracing::debug!(
            backend = cache.backend_name(),
            policy = ?cache.read_policy(),
            "Cache initialized"
        );

        let (store, files) = tokio::try_join!(
            async {
                RecordStore::init(&config.database)
                    .await
                    .context("Failed to initialize record store")
            },
            async {
                files::open(&config.files)
                    .await
                    .context("Failed to initialize file store")
            },
        )?;
        let store = Arc::new(store);

        let repositories = Repositories::builder()
            .store(store.clone())
            .cache(cache.clone())
            .cached_resource_types(config.cache.cached_resource_types.clone())
            .build()?;

        Ok(Self {
            config,
            store,
            cache,
            files,
            repositories,
        })
    }

    async fn check(&self) -> Result<()> {
        self.cache
            .health_check()
            .await
            .with_context(|| format!("Cache ({}) health check failed", self.cache.backend_name()))?;
        println!("cache      {:<10} ok", self.cache.backend_name());

        self.store
            .health_check()
            .await
            .with_context(|| format!("Record store ({}) health check failed", self.store.backend()))?;
        println!("database   {:<10} ok", self.store.backend());

        self.files.health_check().await.with_context(|| {
            format!("File store ({}) health check failed", self.files.backend_name())
        })?;
        println!("files      {:<10} ok", self.files.backend_name());

        Ok(())
    }

    async fn migrate(cli: &CliConfig) -> Result<()> {
        let config = AppConfig::load(cli)?;
        let store = RecordStore::init(&config.database)
            .await
            .context("Failed to apply migrations")?;

        if let Ok(sqlite) = store.sqlite() {
            let version = sqlite
                .schema_version()
                .await
                .context("Failed to read schema version")?;
            tracing::info!(version, "SQLite schema up to date");
        } else {
            tracing::info!(backend = %store.backend(), "Migrations applied");
        }

        store.close().await;
        Ok(())
    }

    async fn handle_cache_command(cli: &CliConfig, cmd: CacheCommands) -> Result<()> {
        match cmd {
            CacheCommands::Key { parts } => {
                println!("{}", cli::compose_key(&parts));
                Ok(())
            }
            CacheCommands::Flush { pattern } => {
                let config = AppConfig::load(cli)?;
                let cache = BaseCache::from_config(&config.cache)
                    .await
                    .context("Failed to initialize cache")?;
                let key = CacheKey::raw(pattern);
                let deleted = cache
                    .delete_pattern(&key)
                    .await
                    .with_context(|| format!("Failed to flush {}", key))?;
                println!("Deleted {} key(s) matching {}", deleted, key);
                Ok(())
            }
        }
    }

    fn init_logging() -> Result<(), ConfigError> {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| ConfigError::NoLogger(e.to_string()))
    }
}

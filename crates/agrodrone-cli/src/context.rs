//! Shared wiring for commands that touch the stores
//!
//! Every data command goes through [`AppContext::open`]:
//! 1. Load configuration (explicit `--config` path, or the default one)
//! 2. Open the SQLite Local Store
//! 3. Build the PostgREST gateway and the configured session
//! 4. Decide connectivity once: `--offline`, or a reachability probe

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use agrodrone_cache::{DatabasePool, SqliteLocalStore};
use agrodrone_core::config::Config;
use agrodrone_core::domain::{TableName, UserId};
use agrodrone_core::ports::{IAuthSession, IReachabilityProbe, StaticNetworkStatus};
use agrodrone_remote::{ConfiguredSession, RestClient, RestGateway};
use agrodrone_sync::{LogNotifier, OfflineCollection, SyncError, SyncOrchestrator};

/// Flags shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub offline: bool,
}

impl GlobalOptions {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Loads configuration and applies environment overrides
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub fn load_config(&self) -> Result<Config> {
        let path = self.config_path();
        let mut config = match &self.config {
            Some(_) => Config::load(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => Config::load_or_default(&path),
        };
        config.apply_env_overrides();
        info!(config_path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteLocalStore>,
    pub remote: Arc<RestGateway>,
    pub session: Arc<ConfiguredSession>,
    pub network: Arc<StaticNetworkStatus>,
    // Keeps the connection pool alive for the store
    _pool: DatabasePool,
}

impl AppContext {
    pub async fn open(options: &GlobalOptions) -> Result<Self> {
        let config = options.load_config()?;

        let pool = DatabasePool::from_config(&config.storage)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database at {}",
                    config.storage.database_path.display()
                )
            })?;
        let store = Arc::new(SqliteLocalStore::new(pool.pool().clone()));

        let client =
            RestClient::from_config(&config.remote).context("Invalid remote configuration")?;
        let remote = Arc::new(RestGateway::new(client));
        let session = Arc::new(
            ConfiguredSession::from_config(&config.remote).context("Invalid remote.user_id")?,
        );

        let online = if options.offline {
            false
        } else {
            remote.probe().await
        };
        info!(online, forced_offline = options.offline, "Connectivity decided");

        Ok(Self {
            config,
            store,
            remote,
            session,
            network: Arc::new(StaticNetworkStatus(online)),
            _pool: pool,
        })
    }

    pub fn is_online(&self) -> bool {
        self.network.0
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            self.store.clone(),
            self.remote.clone(),
            self.network.clone(),
            Arc::new(LogNotifier::new()),
        )
    }

    pub fn collection(&self, table: TableName) -> OfflineCollection {
        OfflineCollection::new(
            table,
            self.store.clone(),
            self.remote.clone(),
            self.network.clone(),
            self.session.clone(),
        )
        .with_config(&self.config.sync)
    }

    /// The signed-in user, or [`SyncError::NotAuthenticated`]
    pub async fn require_user(&self) -> Result<UserId> {
        self.session
            .current_user()
            .await?
            .ok_or_else(|| SyncError::NotAuthenticated.into())
    }
}

/// Parses a table argument, listing the valid names on failure
pub fn parse_table(name: &str) -> Result<TableName> {
    name.parse::<TableName>().map_err(|_| {
        let valid: Vec<&str> = agrodrone_core::domain::ALL_TABLES
            .iter()
            .map(TableName::as_str)
            .collect();
        anyhow::anyhow!("Unknown table '{}'. Valid tables: {}", name, valid.join(", "))
    })
}

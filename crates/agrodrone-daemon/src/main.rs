//! AgroDrone Daemon - Background synchronization service
//!
//! This binary runs next to the field app and handles:
//! - Populating the Local Store at start-up
//! - Connectivity monitoring through the backend reachability probe
//! - A full sync whenever connectivity returns
//! - Periodic full syncs while online
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The connectivity monitor and the reconnect scheduler run as background
//! tasks; the main task runs the periodic sync loop. All three observe one
//! `CancellationToken` that is triggered on receipt of SIGTERM or SIGINT.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use agrodrone_cache::{DatabasePool, SqliteLocalStore};
use agrodrone_core::config::Config;
use agrodrone_core::domain::{SyncOutcome, UserId};
use agrodrone_core::ports::{
    IAuthSession, ILocalStore, INetworkStatus, INotificationService, IReachabilityProbe,
    IRemoteGateway,
};
use agrodrone_remote::{ConfiguredSession, RestClient, RestGateway};
use agrodrone_sync::{ConnectivityMonitor, LogNotifier, ReconnectScheduler, SyncOrchestrator};

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the wired-up sync stack and drives it until shutdown
struct DaemonService {
    config: Config,
    orchestrator: Arc<SyncOrchestrator>,
    monitor: Arc<ConnectivityMonitor>,
    session: Arc<dyn IAuthSession>,
    notifier: Arc<dyn INotificationService>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the database and builds the PostgREST adapters from `config`
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_pool = DatabasePool::from_config(&config.storage)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database at {}",
                    config.storage.database_path.display()
                )
            })?;
        let store = Arc::new(SqliteLocalStore::new(db_pool.pool().clone()));

        let client =
            RestClient::from_config(&config.remote).context("Invalid remote configuration")?;
        let gateway = Arc::new(RestGateway::new(client));
        let session = Arc::new(
            ConfiguredSession::from_config(&config.remote).context("Invalid remote.user_id")?,
        );

        Ok(Self::from_parts(
            config,
            store,
            gateway.clone(),
            gateway,
            session,
            Arc::new(LogNotifier::new()),
            shutdown,
        ))
    }

    fn from_parts(
        config: Config,
        store: Arc<dyn ILocalStore>,
        remote: Arc<dyn IRemoteGateway>,
        probe: Arc<dyn IReachabilityProbe>,
        session: Arc<dyn IAuthSession>,
        notifier: Arc<dyn INotificationService>,
        shutdown: CancellationToken,
    ) -> Self {
        let monitor = Arc::new(ConnectivityMonitor::new(
            probe,
            Duration::from_secs(config.sync.probe_interval_secs),
            false,
        ));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store,
            remote,
            monitor.clone(),
            notifier.clone(),
        ));

        Self {
            config,
            orchestrator,
            monitor,
            session,
            notifier,
            shutdown,
        }
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Runs the daemon until the shutdown token is cancelled
    ///
    /// 1. Probes connectivity once and initializes offline data
    /// 2. Spawns the connectivity monitor and the reconnect scheduler
    /// 3. Enters the periodic sync loop
    async fn run(&self) -> Result<()> {
        let online = self.monitor.check_now().await;
        info!(online, "Initial connectivity");

        match self.current_user().await {
            Some(user) => match self.orchestrator.initialize_offline_data(&user).await {
                Ok(Some(summary)) => info!(
                    rows = summary.total_rows(),
                    errors = summary.errors.len(),
                    "Initial download finished"
                ),
                Ok(None) => info!("Starting offline with local data"),
                Err(e) => return Err(e).context("Failed to initialize the local store"),
            },
            None => warn!("No user configured, syncs are skipped until remote.user_id is set"),
        }

        let monitor_task = {
            let monitor = Arc::clone(&self.monitor);
            let token = self.shutdown.clone();
            tokio::spawn(async move { monitor.run(token).await })
        };

        // Created after the initial probe so the scheduler's baseline is the
        // real state rather than the monitor's placeholder
        let mut scheduler = ReconnectScheduler::new(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.session),
            Arc::clone(&self.notifier),
            self.monitor.subscribe(),
        )
        .with_config(&self.config.sync);
        let scheduler_task = {
            let token = self.shutdown.clone();
            tokio::spawn(async move { scheduler.run(token).await })
        };

        self.sync_loop().await;

        for (name, task) in [
            ("connectivity monitor", monitor_task),
            ("reconnect scheduler", scheduler_task),
        ] {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "Background task ended abnormally");
            }
        }
        Ok(())
    }

    /// Full sync every `sync.poll_interval_secs`
    ///
    /// The first tick is consumed up front: start-up already downloaded and
    /// the reconnect scheduler covers the offline-to-online edge.
    async fn sync_loop(&self) {
        let poll_secs = self.config.sync.poll_interval_secs;
        info!(poll_interval_secs = poll_secs, "Starting sync loop");

        let mut interval = tokio::time::interval(Duration::from_secs(poll_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
            self.sync_cycle().await;
        }

        info!("Sync loop terminated");
    }

    /// One periodic sync; `None` when skipped before reaching the orchestrator
    async fn sync_cycle(&self) -> Option<SyncOutcome> {
        if !self.monitor.is_online() {
            debug!("Offline, periodic sync skipped");
            return None;
        }
        let user = self.current_user().await?;

        let outcome = self.orchestrator.perform_full_sync(&user).await;
        match &outcome {
            SyncOutcome::Completed(report) => info!(
                uploaded = report.uploaded.success,
                failed = report.uploaded.failed,
                deleted = report.deleted.success,
                downloaded = report.downloaded.total_rows(),
                errors = report.errors.len(),
                duration_ms = report.duration_ms,
                "Sync cycle completed"
            ),
            SyncOutcome::Failed { message } => error!(error = %message, "Sync cycle failed"),
            other => debug!(outcome = ?other, "Sync cycle skipped"),
        }
        Some(outcome)
    }

    async fn current_user(&self) -> Option<UserId> {
        match self.session.current_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Failed to resolve current user");
                None
            }
        }
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}

/// Loads, overrides and validates configuration
fn load_config() -> Result<Config> {
    let config_path = Config::default_path();
    let mut config = Config::load_or_default(&config_path);
    config.apply_env_overrides();

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!(
            "Invalid configuration ({}): {}",
            config_path.display(),
            details.join("; ")
        );
    }
    Ok(config)
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(
        database = %config.storage.database_path.display(),
        remote = %config.remote.url,
        "AgroDrone daemon starting (agrodroned)"
    );

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("AgroDrone daemon shut down gracefully"),
        Err(e) => error!(error = %e, "AgroDrone daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

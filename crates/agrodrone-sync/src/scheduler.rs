//! Reconnect scheduler - turns connectivity transitions into syncs
//!
//! The [`ReconnectScheduler`] sits between the
//! [`ConnectivityMonitor`](super::connectivity::ConnectivityMonitor) and the
//! [`SyncOrchestrator`](super::engine::SyncOrchestrator).
//!
//! ## Flow
//!
//! ```text
//! ConnectivityMonitor ──→ watch::Receiver<bool> ──→ ReconnectScheduler
//!                                                      │
//!                         offline: warning notification
//!                         online:  notification, delay, perform_full_sync
//! ```
//!
//! The delay after a reconnect lets the network stack settle before the
//! first request goes out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use agrodrone_core::config::SyncConfig;
use agrodrone_core::domain::SyncOutcome;
use agrodrone_core::ports::{
    IAuthSession, INotificationService, Notification, NotificationPriority,
};

use crate::engine::SyncOrchestrator;

/// Default wait between regaining connectivity and syncing
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Schedules a full sync whenever connectivity comes back
pub struct ReconnectScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    session: Arc<dyn IAuthSession>,
    notifier: Arc<dyn INotificationService>,
    /// Online/offline transitions from the connectivity monitor
    transitions: watch::Receiver<bool>,
    /// Last state acted upon
    was_online: bool,
    reconnect_delay: Duration,
}

impl ReconnectScheduler {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        session: Arc<dyn IAuthSession>,
        notifier: Arc<dyn INotificationService>,
        transitions: watch::Receiver<bool>,
    ) -> Self {
        let was_online = *transitions.borrow();
        Self {
            orchestrator,
            session,
            notifier,
            transitions,
            was_online,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.reconnect_delay = Duration::from_millis(config.reconnect_delay_ms);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Main loop
    ///
    /// Runs until `shutdown` is cancelled or the transition channel closes
    /// (monitor dropped). The state seen at construction is the baseline;
    /// only changes from it are acted upon.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            reconnect_delay_ms = self.reconnect_delay.as_millis() as u64,
            "Reconnect scheduler starting"
        );
        loop {
            tokio::select! {
                changed = self.transitions.changed() => {
                    if changed.is_err() {
                        info!("Connectivity channel closed, scheduler shutting down");
                        break;
                    }
                    let online = *self.transitions.borrow_and_update();
                    if online == self.was_online {
                        continue;
                    }
                    self.was_online = online;

                    if online {
                        self.handle_reconnect(&shutdown).await;
                    } else {
                        self.handle_disconnect().await;
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Reconnect scheduler stopped");
    }

    async fn handle_disconnect(&self) {
        info!("Connection lost, changes will be kept locally");
        self.send_notification(
            Notification::connectivity(
                "You are offline",
                "Changes will be synchronized when the connection is restored.",
            )
            .with_priority(NotificationPriority::High),
        )
        .await;
    }

    async fn handle_reconnect(&self, shutdown: &CancellationToken) {
        info!("Connection restored");
        self.send_notification(Notification::connectivity(
            "Connection restored",
            "Synchronizing data...",
        ))
        .await;

        tokio::select! {
            _ = tokio::time::sleep(self.reconnect_delay) => {}
            _ = shutdown.cancelled() => return,
        }

        let user = match self.session.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("No authenticated user, reconnect sync skipped");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to resolve current user");
                return;
            }
        };

        match self.orchestrator.perform_full_sync(&user).await {
            SyncOutcome::Completed(report) => debug!(
                success = report.uploaded.success,
                failed = report.uploaded.failed,
                "Reconnect sync finished"
            ),
            other => debug!(outcome = ?other, "Reconnect sync did not complete"),
        }
    }

    async fn send_notification(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(title = %notification.title, error = %e, "Failed to deliver notification");
        }
    }
}

//! Connectivity monitor
//!
//! Keeps a cached online/offline flag fresh by probing the remote store on
//! a fixed interval. The flag is published on a `watch` channel; only real
//! transitions wake subscribers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use agrodrone_core::ports::{INetworkStatus, IReachabilityProbe};

/// Probe-driven connectivity state
pub struct ConnectivityMonitor {
    probe: Arc<dyn IReachabilityProbe>,
    probe_interval: Duration,
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Creates a monitor starting in the given state
    ///
    /// Nothing is probed until [`check_now`](Self::check_now) or
    /// [`run`](Self::run) is called.
    pub fn new(probe: Arc<dyn IReachabilityProbe>, probe_interval: Duration, initial: bool) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            probe,
            probe_interval,
            state,
        }
    }

    /// Receiver of online/offline transitions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Overrides the current state
    ///
    /// Returns true if this changed the state.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "Connectivity changed");
        }
        changed
    }

    /// Probes once and publishes the result
    pub async fn check_now(&self) -> bool {
        let online = self.probe.probe().await;
        debug!(online, "Reachability probe finished");
        self.set_online(online);
        online
    }

    /// Probes every interval until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            probe_interval_secs = self.probe_interval.as_secs(),
            "Connectivity monitor starting"
        );
        let mut ticker = tokio::time::interval(self.probe_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_now().await;
                }
                _ = shutdown.cancelled() => break,
            }
        }
        info!("Connectivity monitor stopped");
    }
}

impl INetworkStatus for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }
}

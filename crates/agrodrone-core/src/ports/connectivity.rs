//! Connectivity ports
//!
//! [`INetworkStatus`] answers "are we online right now" without I/O and is
//! consulted before every routing decision. [`IReachabilityProbe`] performs
//! the actual round-trip the monitor uses to keep that answer fresh.

/// Current connectivity snapshot
pub trait INetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}

/// One reachability check against the remote store
#[async_trait::async_trait]
pub trait IReachabilityProbe: Send + Sync {
    /// Returns true if the remote answered
    async fn probe(&self) -> bool;
}

/// Fixed connectivity state, used for forced-offline mode
#[derive(Debug, Clone, Copy)]
pub struct StaticNetworkStatus(pub bool);

impl INetworkStatus for StaticNetworkStatus {
    fn is_online(&self) -> bool {
        self.0
    }
}

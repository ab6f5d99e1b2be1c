//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync core depends
//! on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ILocalStore`] - On-device persistent store (SQLite)
//! - [`IRemoteGateway`] - Row-level reads and writes against the backend
//! - [`IAuthSession`] - Current authenticated user
//! - [`INetworkStatus`] / [`IReachabilityProbe`] - Connectivity state
//! - [`INotificationService`] - User-facing sync and connectivity messages

pub mod connectivity;
pub mod local_store;
pub mod notification;
pub mod remote_gateway;

pub use connectivity::{INetworkStatus, IReachabilityProbe, StaticNetworkStatus};
pub use local_store::{ILocalStore, IndexQuery, BULK_PUT_POLICY, PUT_POLICY};
pub use notification::{INotificationService, Notification, NotificationPriority};
pub use remote_gateway::{Condition, IAuthSession, IRemoteGateway, RowFilter};

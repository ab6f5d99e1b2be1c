//! AgroDrone Core - Domain types and port definitions for offline-first sync
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `TableName`, `Record`, `MergePolicy`, `SyncTally`, `SyncReport`
//! - **Port definitions** - Traits for adapters: `ILocalStore`, `IRemoteGateway`,
//!   `IAuthSession`, `INetworkStatus`, `IReachabilityProbe`, `INotificationService`
//! - **Configuration** - YAML-backed settings with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O. Ports define the
//! trait interfaces that the cache, remote and sync crates implement or consume.

pub mod config;
pub mod domain;
pub mod ports;

//! Integration tests for agrodrone-sync
//!
//! Runs the orchestrator, collection accessor and reconnect scheduler
//! against an in-memory SQLite Local Store and an in-memory remote store.

mod common;

mod test_collection;

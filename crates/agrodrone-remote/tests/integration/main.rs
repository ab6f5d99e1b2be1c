//! Integration tests for agrodrone-remote
//!
//! Uses wiremock to simulate the PostgREST endpoint and verifies end-to-end
//! behavior of selects, upserts, deletes, retries and the reachability probe.

mod common;

mod test_gateway;

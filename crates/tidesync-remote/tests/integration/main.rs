//! Integration tests for tidesync-remote
//!
//! Uses wiremock to simulate the record store API and verifies the
//! requests sent by `HttpRemoteStore` and how responses are classified.

mod common;

mod test_mutations;
mod test_state;

//! Test doubles and helpers.
//!
//! The mock warehouse records every statement it sees, which is what the
//! statement-shape and fail-fast assertions in this crate are built on.

mod mocks;

pub use mocks::{FailingCredentials, MockWarehouse};

/// Initializes a tracing subscriber for tests. Safe to call repeatedly.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

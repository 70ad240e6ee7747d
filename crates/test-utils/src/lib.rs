pub mod builders;
pub mod fakes;
pub mod harness;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

pub use harness::{at, monday_morning, TestEngine};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs go through `with_test_writer()`, so they are only shown for failing
/// tests unless run with `-- --nocapture`.
///
/// Enable levels with e.g. `JOBFLOW_LOG=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(jobflow::logging::LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

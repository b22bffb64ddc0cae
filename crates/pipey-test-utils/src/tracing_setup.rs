//! Test log output for pipe reads and bridge runs.

use tracing_subscriber::EnvFilter;

/// Route pipey's logs to the test writer, filtered by `RUST_LOG`.
/// Later calls in the same process are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

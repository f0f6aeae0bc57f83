//! Tracing initialisation helpers for tests.
//!
//! The subscriber is installed at most once per process, so every test may
//! call [`init_test_tracing`] without coordinating with the others.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_TEST_FILTER: &str = "lightning_rest_core=debug,warn";

/// Install a subscriber that writes through the test harness's capture.
///
/// Honours `RUST_LOG`; falls back to [`DEFAULT_TEST_FILTER`].
///
/// ```ignore
/// #[tokio::test]
/// async fn forwards_call() {
///     lightning_rest_test_utils::tracing_setup::init_test_tracing();
///     // ...
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER)),
        )
        .with_test_writer()
        .try_init();
}

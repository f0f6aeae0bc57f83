//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use lightning_rest_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .bind("127.0.0.1")
///     .socket_path(daemon.socket_path())
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    /// Starts from defaults, bound to loopback.
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.server.bind = "127.0.0.1".to_string();
        Self { config }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.server.bind = addr.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.server.max_body_bytes = limit;
        self
    }

    pub fn socket_path(mut self, path: &Path) -> Self {
        self.config.rpc.socket_path = path.display().to_string();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.rpc.timeout_secs = secs;
        self
    }

    pub fn not_found_codes(mut self, codes: &[i64]) -> Self {
        self.config.errors.not_found_codes = codes.to_vec();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

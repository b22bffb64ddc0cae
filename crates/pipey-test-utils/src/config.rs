//! Bridge configs for tests.

use pipey_config::AppConfig;

/// Builds an [`AppConfig`] without validating it, so bridge tests can bind
/// port `0` and use sub-second pipe timeouts.
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.config.server.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.config.pipe.timeout_secs = secs;
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

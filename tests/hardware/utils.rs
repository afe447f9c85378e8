//! Utility functions for hardware testing.

use arduino_serial::SessionConfig;
use std::env;

/// Test port configuration from environment.
pub struct TestPortConfig {
    pub port_name: String,
    pub baud_rate: u32,
}

impl TestPortConfig {
    /// Get test configuration from environment variables.
    pub fn from_env() -> Option<Self> {
        let port_name = env::var("TEST_PORT").ok()?;
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(115_200);

        Some(TestPortConfig {
            port_name,
            baud_rate,
        })
    }

    /// Session configuration for the test board.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.port_name.clone()).baud_rate(self.baud_rate)
    }
}

/// Skip test if hardware is not available.
pub fn skip_without_hardware() -> Option<TestPortConfig> {
    let config = TestPortConfig::from_env();
    if config.is_none() {
        println!("Skipping hardware test: TEST_PORT not set");
    }
    config
}

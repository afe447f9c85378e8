//! Configuration module for arduino-serial.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `ARDUINO_SERIAL_CONFIG` environment variable (explicit path)
//! 2. `./arduino-serial.toml` (current directory)
//! 3. `~/.config/arduino-serial/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\arduino-serial\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `ARDUINO_SERIAL_<SECTION>_<KEY>`, for example
//! `ARDUINO_SERIAL_DEVICE_PORT=COM15` or `ARDUINO_SERIAL_LOGGING_LEVEL=debug`.
//!
//! # Example
//!
//! ```rust,no_run
//! use arduino_serial::config::ConfigLoader;
//! use arduino_serial::SerialSession;
//!
//! let loader = ConfigLoader::load()?;
//! let session = SerialSession::new(loader.config().device.session_config());
//! # Ok::<(), arduino_serial::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, DeviceConfig, LogFormat, LoggingConfig};

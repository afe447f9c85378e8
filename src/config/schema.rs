//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! Every section has defaults, so an empty file is a valid configuration.

use super::error::{ConfigError, ConfigResult};
use crate::board::{BoardKind, BoardProfile};
use crate::framing::DEFAULT_DELIMITER;
use crate::port::{
    default_port_prefix, find_highest_port, DataBits, FlowControl, Parity, PortConfiguration,
    StopBits,
};
use crate::session::{SessionConfig, DEFAULT_COMMAND_DELAY, DEFAULT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Board and port settings
    pub device: DeviceConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values that deserialize fine but cannot drive a session.
    pub fn validate(&self) -> ConfigResult<()> {
        self.device.validate()?;
        self.logging.validate()
    }
}

/// Board and serial line settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Board preset name; unknown names mean "Uno"
    pub board: String,
    /// Explicit port; when unset the highest numbered port is used
    pub port: Option<String>,
    /// Prefix for auto-selection (platform default when unset)
    pub port_prefix: Option<String>,
    /// Overrides the board's baud rate
    pub baud_rate: Option<u32>,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Assert DTR on open (resets most boards)
    pub dtr: bool,
    /// Assert RTS on open
    pub rts: bool,
    /// End-of-submission character
    pub delimiter: char,
    /// Read/write timeout in milliseconds
    pub timeout_ms: u64,
    /// Pause after each command in milliseconds
    pub command_delay_ms: u64,
    /// Reader idle sleep in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let port = PortConfiguration::default();
        Self {
            board: BoardKind::default().name().to_string(),
            port: None,
            port_prefix: None,
            baud_rate: None,
            data_bits: port.data_bits,
            parity: port.parity,
            stop_bits: port.stop_bits,
            flow_control: port.flow_control,
            dtr: port.dtr,
            rts: port.rts,
            delimiter: DEFAULT_DELIMITER,
            timeout_ms: port.timeout.as_millis() as u64,
            command_delay_ms: DEFAULT_COMMAND_DELAY.as_millis() as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl DeviceConfig {
    /// The configured board preset.
    pub fn board_profile(&self) -> BoardProfile {
        BoardKind::from_name(&self.board).profile()
    }

    /// Effective baud rate: explicit override, else the board's.
    pub fn effective_baud_rate(&self) -> u32 {
        self.baud_rate
            .unwrap_or_else(|| self.board_profile().baud_rate)
    }

    /// Prefix used when no explicit port is configured.
    pub fn port_prefix(&self) -> &str {
        self.port_prefix.as_deref().unwrap_or(default_port_prefix())
    }

    /// Explicit port, or the highest numbered port currently present.
    pub fn resolve_port_name(&self) -> String {
        match self.port.as_deref().map(str::trim) {
            Some(port) if !port.is_empty() => port.to_string(),
            _ => find_highest_port(self.port_prefix()),
        }
    }

    /// Serial line parameters.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.effective_baud_rate(),
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
            timeout: Duration::from_millis(self.timeout_ms),
            dtr: self.dtr,
            rts: self.rts,
        }
    }

    /// Build a session configuration for `port_name`.
    pub fn session_config_for(&self, port_name: impl Into<String>) -> SessionConfig {
        SessionConfig {
            port_name: port_name.into(),
            port: self.port_configuration(),
            delimiter: self.delimiter,
            command_delay: Duration::from_millis(self.command_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Build a session configuration, resolving the port name.
    pub fn session_config(&self) -> SessionConfig {
        self.session_config_for(self.resolve_port_name())
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.baud_rate == Some(0) {
            return Err(ConfigError::ZeroBaudRate);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.delimiter == '\0' {
            return Err(ConfigError::Delimiter(self.delimiter));
        }
        Ok(())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive: "trace", "debug", "info", "warn", "error" or a full EnvFilter string
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        EnvFilter::try_new(&self.level)
            .map(drop)
            .map_err(|e| ConfigError::LogFilter {
                filter: self.level.clone(),
                message: e.to_string(),
            })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

//! Arduino Serial Library
//!
//! Host-side driver for Arduino-class boards on a serial link. Raw bytes are
//! framed into line-delimited submissions, the board's one-time `READY`
//! handshake gates outbound commands, and completed submissions are handed
//! to subscribers.
//!
//! # Modules
//!
//! - `board`: Board presets (name and baud rate)
//! - `config`: Configuration management with TOML support
//! - `error`: Session error type
//! - `framing`: Line framer and handshake detection
//! - `logging`: `tracing` subscriber setup
//! - `port`: Port abstraction layer, mocks and port discovery
//! - `session`: The serial session state machine

pub mod board;
pub mod config;
pub mod error;
pub mod framing;
pub mod logging;
pub mod port;
pub mod session;

// Re-export commonly used types for convenience
pub use board::{BoardKind, BoardProfile};
pub use error::{SessionError, SessionResult};
pub use framing::{is_handshake, LineFramer, Submission, DEFAULT_DELIMITER, HANDSHAKE_KEYWORD};
pub use port::{
    DataBits, FlowControl, MockPortOpener, MockSerialPort, Parity, PortConfiguration, PortError,
    PortOpener, SerialPortAdapter, StopBits, SyncSerialPort, SystemPortOpener,
};
pub use session::{SerialSession, SessionConfig, SessionStatus, SubscriptionId};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};

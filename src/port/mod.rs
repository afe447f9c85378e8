//! Port abstraction layer for serial communication.
//!
//! Provides the transport traits a session consumes, the `serialport`-backed
//! implementation, mocks for testing, and port name discovery.

pub mod discovery;
pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use discovery::{default_port_prefix, find_highest_port, highest_numbered_port, list_port_names};
pub use error::PortError;
pub use mock::{MockOpenFailure, MockPortOpener, MockSerialPort};
pub use sync_port::{SyncSerialPort, SystemPortOpener};
pub use traits::*;

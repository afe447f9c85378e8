use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by [`SerialSession`](crate::session::SerialSession).
///
/// None of these are fatal to the session: after any of them it is left
/// either fully open or fully closed.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is already open on {0}. Stop it before starting again.")]
    AlreadyOpen(String),

    #[error("Operation requires an open serial port, but the session is closed.")]
    NotOpen,

    #[error("The board has not sent its READY handshake yet.")]
    NotReady,

    #[error("Failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: PortError,
    },

    #[error("A serial port error occurred: {0}")]
    Port(#[from] PortError),
}

impl SessionError {
    /// True when the command was refused by gating rather than by the transport.
    pub fn is_gated(&self) -> bool {
        matches!(self, Self::NotOpen | Self::NotReady)
    }
}

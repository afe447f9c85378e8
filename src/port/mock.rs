//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates a board without requiring
//! hardware, and a `MockPortOpener` that hands it to a session. Clones share
//! state, so a test can keep one handle and feed bytes while the session
//! reads from another.

use super::error::PortError;
use super::traits::{PortConfiguration, PortOpener, SerialPortAdapter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Inner state of the mock port.
#[derive(Debug, Default)]
struct MockPortState {
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Log of all bytes written to the port.
    write_log: Vec<Vec<u8>>,
    /// Whether the next operation should time out.
    should_timeout: bool,
    /// Whether reads fail as if the device was unplugged.
    fail_reads: bool,
    /// Configured timeout duration.
    timeout: Duration,
    /// Whether buffers have been cleared.
    buffers_cleared: bool,
}

/// Mock serial port implementation for testing.
///
/// # Example
/// ```
/// use arduino_serial::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"READY\n");
///
/// let bytes = port.read_available().unwrap();
/// assert_eq!(bytes, b"READY\n");
///
/// port.write_line("LED ON").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"LED ON\n".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_secs(1),
                ..Default::default()
            })),
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Everything written so far, joined into one string.
    pub fn written_text(&self) -> String {
        let state = self.state.lock();
        state
            .write_log
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk))
            .collect()
    }

    /// Clear the write log.
    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }

    /// Set whether the next read/write operation should time out.
    pub fn set_should_timeout(&self, should_timeout: bool) {
        self.state.lock().should_timeout = should_timeout;
    }

    /// Make every read fail with a broken-pipe error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Get whether buffers have been cleared.
    pub fn was_cleared(&self) -> bool {
        self.state.lock().buffers_cleared
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }

        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.fail_reads {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device disconnected",
            )));
        }

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.buffers_cleared = true;
        Ok(())
    }

    fn bytes_to_read(&self) -> Option<usize> {
        let state = self.state.lock();
        // A failing device still has to surface its error through a read.
        if state.fail_reads {
            None
        } else {
            Some(state.read_queue.len())
        }
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

/// Failure a [`MockPortOpener`] can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOpenFailure {
    /// The port is held by another process.
    InUse,
    /// The port does not exist.
    Missing,
}

#[derive(Debug, Default)]
struct MockOpenerState {
    failure: Option<MockOpenFailure>,
    opened: Vec<(String, PortConfiguration)>,
}

/// Hands out clones of one shared [`MockSerialPort`].
#[derive(Debug, Clone)]
pub struct MockPortOpener {
    port: MockSerialPort,
    state: Arc<Mutex<MockOpenerState>>,
}

impl MockPortOpener {
    /// Create an opener that always yields `port`.
    pub fn new(port: MockSerialPort) -> Self {
        Self {
            port,
            state: Arc::new(Mutex::new(MockOpenerState::default())),
        }
    }

    /// The port every successful open returns.
    pub fn port(&self) -> &MockSerialPort {
        &self.port
    }

    /// Make subsequent opens fail (or succeed again with `None`).
    pub fn set_failure(&self, failure: Option<MockOpenFailure>) {
        self.state.lock().failure = failure;
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        self.state.lock().opened.len()
    }

    /// Port name and configuration of the most recent successful open.
    pub fn last_open(&self) -> Option<(String, PortConfiguration)> {
        self.state.lock().opened.last().cloned()
    }
}

impl PortOpener for MockPortOpener {
    fn open(
        &self,
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut state = self.state.lock();
        match state.failure {
            Some(MockOpenFailure::InUse) => Err(PortError::permission_denied(port_name)),
            Some(MockOpenFailure::Missing) => Err(PortError::not_found(port_name)),
            None => {
                state.opened.push((port_name.to_string(), config.clone()));
                Ok(Box::new(self.port.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_read() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_write_logging() {
        let mut port = MockSerialPort::new("MOCK0");
        port.write_bytes(b"Test1").unwrap();
        port.write_bytes(b"Test2").unwrap();

        let log = port.get_write_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], b"Test1");
        assert_eq!(log[1], b"Test2");
        assert_eq!(port.written_text(), "Test1Test2");
    }

    #[test]
    fn test_timeout_simulation() {
        let mut port = MockSerialPort::new("MOCK0");
        port.set_should_timeout(true);

        let mut buffer = [0u8; 10];
        let result = port.read_bytes(&mut buffer);
        assert!(matches!(result, Err(PortError::Timeout(_))));
    }

    #[test]
    fn test_fail_reads_surfaces_through_read_available() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"data");
        port.set_fail_reads(true);

        let err = port.read_available().unwrap_err();
        assert!(!err.is_no_data());
    }

    #[test]
    fn test_clones_share_state() {
        let port = MockSerialPort::new("MOCK0");
        let mut reader = port.clone();
        port.enqueue_read(b"x");

        assert_eq!(reader.read_available().unwrap(), b"x");
        assert_eq!(port.available_bytes(), 0);
    }

    #[test]
    fn test_clear_buffers() {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Should be cleared");

        port.clear_buffers().unwrap();
        assert!(port.was_cleared());
        assert_eq!(port.available_bytes(), 0);
    }

    #[test]
    fn test_opener_failure_modes() {
        let opener = MockPortOpener::new(MockSerialPort::new("MOCK0"));
        let config = PortConfiguration::default();

        opener.set_failure(Some(MockOpenFailure::InUse));
        assert!(matches!(
            opener.open("COM3", &config),
            Err(PortError::PermissionDenied(_))
        ));

        opener.set_failure(Some(MockOpenFailure::Missing));
        assert!(matches!(
            opener.open("COM3", &config),
            Err(PortError::NotFound(_))
        ));
        assert_eq!(opener.open_count(), 0);

        opener.set_failure(None);
        assert!(opener.open("COM3", &config).is_ok());
        assert_eq!(opener.open_count(), 1);
        assert_eq!(opener.last_open().unwrap().0, "COM3");
    }
}

//! Shared test utilities for session tests.
//!
//! This module provides:
//! - Mock-backed sessions with short delays
//! - A submission recorder
//! - A polling helper for assertions on the reader thread's progress

#![allow(dead_code)]

use arduino_serial::port::{MockPortOpener, MockSerialPort};
use arduino_serial::{SerialSession, SessionConfig};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A closed session on a mock port, plus the opener feeding it.
pub fn mock_session(port_name: &str) -> (SerialSession, MockPortOpener) {
    mock_session_with(SessionConfig::new(port_name).command_delay(Duration::from_millis(1)))
}

/// Like [`mock_session`] with a caller-supplied configuration.
pub fn mock_session_with(config: SessionConfig) -> (SerialSession, MockPortOpener) {
    let opener = MockPortOpener::new(MockSerialPort::new(config.port_name.clone()));
    let config = config.poll_interval(Duration::from_millis(1));
    (SerialSession::with_opener(config, opener.clone()), opener)
}

/// Collects every submission delivered to a subscriber.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Register a new recorder on `session`.
    pub fn attach(session: &SerialSession) -> Self {
        let recorder = Self::default();
        let sink = recorder.clone();
        session.subscribe(move |text| sink.seen.lock().unwrap().push(text.to_string()));
        recorder
    }

    pub fn submissions(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Default wait for reader-thread driven assertions.
pub const WAIT: Duration = Duration::from_secs(2);

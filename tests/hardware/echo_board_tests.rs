//! Tests against a real board running an echo sketch.

use super::utils::skip_without_hardware;
use crate::common::{wait_until, Recorder};
use arduino_serial::SerialSession;
use std::time::Duration;

/// Boards reset on DTR and need a moment to boot.
const BOOT_TIMEOUT: Duration = Duration::from_secs(5);

#[test]
#[ignore]
fn test_board_handshake() {
    let Some(config) = skip_without_hardware() else {
        return;
    };

    let session = SerialSession::new(config.session_config());
    session.start(None).expect("open test port");
    assert!(wait_until(BOOT_TIMEOUT, || session.is_ready()));
    session.stop();
    assert!(!session.is_open());
}

#[test]
#[ignore]
fn test_board_echoes_commands() {
    let Some(config) = skip_without_hardware() else {
        return;
    };

    let session = SerialSession::new(config.session_config());
    let recorder = Recorder::attach(&session);
    session.start(None).expect("open test port");
    assert!(wait_until(BOOT_TIMEOUT, || session.is_ready()));

    session.send_command("ping").unwrap();
    assert!(wait_until(Duration::from_secs(2), || recorder
        .submissions()
        .iter()
        .any(|s| s.contains("ping"))));
}

#[test]
#[ignore]
fn test_missing_port_does_not_open() {
    let session = SerialSession::new(arduino_serial::SessionConfig::new("/dev/nonexistent_port_12345"));
    assert!(session.start(None).is_err());
    assert!(!session.is_open());
}

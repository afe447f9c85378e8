//! End-to-end session tests driven through the reader thread and a mock port.

mod common;

use arduino_serial::port::MockOpenFailure;
use arduino_serial::{SerialSession, SessionConfig, SessionError, SessionStatus};
use common::{mock_session, mock_session_with, wait_until, Recorder, WAIT};
use pretty_assertions::assert_eq;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

#[test]
fn test_handshake_then_message_over_the_wire() {
    let (session, opener) = mock_session("COM3");
    let recorder = Recorder::attach(&session);
    session.start(None).unwrap();

    opener.port().enqueue_read(b"READY\n");
    assert!(wait_until(WAIT, || session.is_ready()));

    opener.port().enqueue_read(b"hello\n");
    assert!(wait_until(WAIT, || recorder.len() == 1));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(recorder.submissions(), vec!["hello"]);
}

#[test]
fn test_prefix_handshake_in_any_case() {
    let (session, opener) = mock_session("COM3");
    let recorder = Recorder::attach(&session);
    session.start(None).unwrap();

    opener.port().enqueue_read(b"ready please\n");
    assert!(wait_until(WAIT, || session.is_ready()));
    assert!(recorder.submissions().is_empty());
}

#[test]
fn test_submission_split_across_reads() {
    let (session, opener) = mock_session("COM3");
    let recorder = Recorder::attach(&session);
    session.start(None).unwrap();

    opener.port().enqueue_read(b"tem");
    assert!(wait_until(WAIT, || opener.port().available_bytes() == 0));
    opener.port().enqueue_read(b"p=21\r\n\nhum=40\n");

    assert!(wait_until(WAIT, || recorder.len() == 2));
    assert_eq!(recorder.submissions(), vec!["temp=21", "hum=40"]);
}

#[test]
fn test_commands_wait_for_handshake() {
    let (session, opener) = mock_session("COM3");
    session.start(None).unwrap();

    assert!(matches!(
        session.send_command("LED ON"),
        Err(SessionError::NotReady)
    ));
    assert!(opener.port().get_write_log().is_empty());

    opener.port().enqueue_read(b"READY\r\n");
    assert!(wait_until(WAIT, || session.is_ready()));

    session.send_command("LED ON").unwrap();
    session.send_command("LED OFF").unwrap();
    assert_eq!(opener.port().written_text(), "LED ON\nLED OFF\n");
}

#[test]
fn test_send_command_throttles_the_caller() {
    let config = SessionConfig::new("COM3").command_delay(Duration::from_millis(30));
    let (session, _opener) = mock_session_with(config);
    session.start(None).unwrap();
    session.handle_incoming(b"READY\n");

    let started = Instant::now();
    session.send_command("A").unwrap();
    session.send_command("B").unwrap();
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[test]
fn test_throttle_does_not_stall_reception() {
    let config = SessionConfig::new("COM3").command_delay(Duration::from_millis(300));
    let (session, opener) = mock_session_with(config);
    let session = Arc::new(session);
    let recorder = Recorder::attach(&session);
    session.start(None).unwrap();
    session.handle_incoming(b"READY\n");

    let sender = {
        let session = Arc::clone(&session);
        std::thread::spawn(move || session.send_command("SLOW"))
    };

    opener.port().enqueue_read(b"still listening\n");
    assert!(wait_until(Duration::from_millis(250), || recorder.len() == 1));
    sender.join().unwrap().unwrap();
}

#[test]
fn test_nothing_is_sent_while_closed() {
    let (session, opener) = mock_session("COM3");

    assert!(matches!(
        session.send_command("LED ON"),
        Err(SessionError::NotOpen)
    ));
    session.handle_incoming(b"READY\n");
    assert!(matches!(
        session.send_command("LED ON"),
        Err(SessionError::NotOpen)
    ));
    assert!(opener.port().get_write_log().is_empty());
}

#[test]
fn test_failed_start_is_reported_and_recoverable() {
    let (session, opener) = mock_session("COM3");
    opener.set_failure(Some(MockOpenFailure::Missing));

    assert!(session.start(None).is_err());
    assert_eq!(session.status(), SessionStatus::Closed);
    session.stop();

    opener.set_failure(None);
    session.start(None).unwrap();
    assert!(session.is_open());
}

#[test]
fn test_restart_does_not_replay_stale_input() {
    let (session, opener) = mock_session("COM3");
    let recorder = Recorder::attach(&session);
    session.start(None).unwrap();

    opener.port().enqueue_read(b"READY\nhalf a li");
    assert!(wait_until(WAIT, || session.is_ready()
        && opener.port().available_bytes() == 0));

    session.stop();
    assert!(!session.is_ready());

    session.start(None).unwrap();
    assert!(!session.is_ready());
    opener.port().enqueue_read(b"line\n");
    assert!(wait_until(WAIT, || recorder.len() == 1));
    assert_eq!(recorder.submissions(), vec!["line"]);
}

#[test]
fn test_stop_is_idempotent() {
    let (session, _opener) = mock_session("COM3");
    session.stop();
    session.start(None).unwrap();
    session.handle_incoming(b"READY\n");

    session.stop();
    session.stop();
    assert!(!session.is_open());
    assert!(!session.is_ready());
}

#[test]
fn test_read_failure_closes_the_session() {
    let (session, opener) = mock_session("COM3");
    session.start(None).unwrap();
    session.handle_incoming(b"READY\n");

    opener.port().set_fail_reads(true);
    assert!(wait_until(WAIT, || !session.is_open()));
    assert!(!session.is_ready());
    assert!(matches!(session.send_command("X"), Err(SessionError::NotOpen)));

    opener.port().set_fail_reads(false);
    session.start(None).unwrap();
    assert!(session.is_open());
}

#[test]
fn test_subscriber_can_stop_the_session() {
    let (session, opener) = mock_session("COM3");
    let session = Arc::new(session);
    let weak = Arc::downgrade(&session);
    let recorder = Recorder::attach(&session);
    session.subscribe(move |text| {
        if text == "bye" {
            if let Some(session) = weak.upgrade() {
                session.stop();
            }
        }
    });
    session.start(None).unwrap();

    opener.port().enqueue_read(b"bye\nafter\n");
    assert!(wait_until(WAIT, || !session.is_open()));
    assert_eq!(recorder.submissions(), vec!["bye"]);
}

#[test]
fn test_outside_stop_races_subscriber_stop() {
    let (session, opener) = mock_session("COM3");
    let session = Arc::new(session);
    let weak = Arc::downgrade(&session);
    let (entered_tx, entered_rx) = mpsc::channel();
    session.subscribe(move |text| {
        if text == "bye" {
            let _ = entered_tx.send(());
            std::thread::sleep(Duration::from_millis(200));
            if let Some(session) = weak.upgrade() {
                session.stop();
            }
        }
    });
    session.start(None).unwrap();

    opener.port().enqueue_read(b"bye\n");
    entered_rx.recv_timeout(WAIT).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let stopper = {
        let session = Arc::clone(&session);
        std::thread::spawn(move || {
            session.stop();
            let _ = done_tx.send(());
        })
    };
    assert!(
        done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
        "stop did not return while a subscriber was stopping"
    );
    stopper.join().unwrap();
    assert!(!session.is_open());
}

#[test]
fn test_subscriber_reconnect_keeps_a_single_reader() {
    let (session, opener) = mock_session("COM3");
    let session = Arc::new(session);
    let weak = Arc::downgrade(&session);
    let recorder = Recorder::attach(&session);
    session.subscribe(move |text| {
        if text == "reconnect" {
            if let Some(session) = weak.upgrade() {
                session.stop();
                session.start(None).unwrap();
            }
        }
    });
    session.start(None).unwrap();

    opener.port().enqueue_read(b"reconnect\nstale\n");
    assert!(wait_until(WAIT, || opener.open_count() == 2));
    assert!(session.is_open());

    let expected: Vec<String> = (0..300).map(|i| format!("line {i}")).collect();
    for line in &expected {
        opener.port().enqueue_read(format!("{line}\n").as_bytes());
    }
    assert!(wait_until(WAIT, || recorder.len() == expected.len() + 1));
    std::thread::sleep(Duration::from_millis(20));

    let mut wanted = vec!["reconnect".to_string()];
    wanted.extend(expected);
    assert_eq!(recorder.submissions(), wanted);
}

#[test]
fn test_subscriber_can_reply_from_callback() {
    let (session, opener) = mock_session("COM3");
    let session = Arc::new(session);
    let weak = Arc::downgrade(&session);
    session.subscribe(move |text| {
        if let Some(session) = weak.upgrade() {
            let _ = session.send_command(&format!("ACK {text}"));
        }
    });
    session.start(None).unwrap();

    opener.port().enqueue_read(b"READY\nping\n");
    assert!(wait_until(WAIT, || opener.port().written_text() == "ACK ping\n"));
}

#[test]
fn test_subscribers_run_in_registration_order() {
    let (session, _opener) = mock_session("COM3");
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        session.subscribe(move |_| order.lock().unwrap().push(tag));
    }
    session.start(None).unwrap();

    session.handle_incoming(b"go\n");
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn test_custom_delimiter_end_to_end() {
    let (session, opener) = mock_session_with(SessionConfig::new("COM3").delimiter(';'));
    let recorder = Recorder::attach(&session);
    session.start(None).unwrap();

    opener.port().enqueue_read(b"READY;a;b\n;");
    assert!(wait_until(WAIT, || recorder.len() == 2));
    assert!(session.is_ready());
    assert_eq!(recorder.submissions(), vec!["a", "b"]);
}

#[test]
fn test_drop_releases_the_session() {
    let (session, opener) = mock_session("COM3");
    session.start(None).unwrap();
    opener.port().enqueue_read(b"READY\n");
    drop(session);

    let (again, _) = mock_session("COM3");
    again.start(None).unwrap();
    assert!(again.is_open());
}

#[tokio::test]
async fn test_channel_subscription_and_async_send() {
    let (session, opener) = mock_session("COM3");
    let mut rx = session.subscribe_channel();
    session.start(None).unwrap();

    opener.port().enqueue_read(b"READY\nT=21.5\n");
    let text = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(text, "T=21.5");
    assert!(session.is_ready());

    session.send_command_async("READ").await.unwrap();
    assert_eq!(opener.port().written_text(), "READ\n");
}

#[test]
fn test_for_board_uses_board_baud_rate() {
    let session = SerialSession::with_port(&arduino_serial::BoardProfile::due(), "COM5");
    assert_eq!(session.port_name(), "COM5");
    assert_eq!(session.baud_rate(), 115_200);
    assert!(!session.is_open());
}

//! Serial session: one board, one port, one reader thread.
//!
//! # Lifecycle
//!
//! ```text
//! Closed --start--> Open (not ready) --"READY"--> Open (ready)
//!   ^                      |                          |
//!   +--------stop----------+-----------stop-----------+
//! ```
//!
//! While open, a dedicated thread drains the port and feeds the bytes through
//! a [`LineFramer`]. Handshake submissions flip the ready flag; everything
//! else goes to the subscribers, in registration order, on that same thread.
//! A slow subscriber therefore delays the processing of later input.
//!
//! Commands are only written once the board is both open and ready. Each
//! write is followed by a short pause so a slow link can drain.

use crate::board::BoardProfile;
use crate::error::{SessionError, SessionResult};
use crate::framing::{LineFramer, Submission, DEFAULT_DELIMITER};
use crate::port::{
    default_port_prefix, find_highest_port, DataBits, FlowControl, Parity, PortConfiguration,
    PortError, PortOpener, SerialPortAdapter, StopBits, SystemPortOpener,
};
use parking_lot::{Mutex, ReentrantMutex};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Pause after every command write.
pub const DEFAULT_COMMAND_DELAY: Duration = Duration::from_millis(25);

/// How long the reader sleeps when the port has nothing for it.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything needed to open and drive a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub port_name: String,
    pub port: PortConfiguration,
    pub delimiter: char,
    pub command_delay: Duration,
    pub poll_interval: Duration,
}

impl SessionConfig {
    /// 9600 baud, 8N1, newline delimited.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            port: PortConfiguration::default(),
            delimiter: DEFAULT_DELIMITER,
            command_delay: DEFAULT_COMMAND_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Defaults with the board's baud rate.
    pub fn for_board(board: &BoardProfile, port_name: impl Into<String>) -> Self {
        Self::new(port_name).baud_rate(board.baud_rate)
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.port.baud_rate = baud_rate;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.port.parity = parity;
        self
    }

    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.port.data_bits = data_bits;
        self
    }

    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.port.stop_bits = stop_bits;
        self
    }

    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.port.flow_control = flow_control;
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Handle returned by [`SerialSession::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Returns false once it can no longer accept submissions.
type Subscriber = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Closed,
    Open { ready: bool },
}

/// State shared with the reader thread.
struct Shared {
    config: Mutex<SessionConfig>,
    port: Mutex<Option<Box<dyn SerialPortAdapter>>>,
    framer: Mutex<LineFramer>,
    /// Serializes delivery. Reentrant so a subscriber may feed more input.
    delivery: ReentrantMutex<()>,
    /// Thread currently inside `deliver`, if any.
    delivering: Mutex<Option<ThreadId>>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
    /// Bumped on every start; a reader only serves the connection it was
    /// spawned for.
    generation: AtomicU64,
    open: AtomicBool,
    ready: AtomicBool,
}

/// Marks the current thread as delivering until dropped.
struct DeliveryScope<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
    previous: Option<ThreadId>,
}

impl<'a> DeliveryScope<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        let previous = slot.lock().replace(thread::current().id());
        Self { slot, previous }
    }
}

impl Drop for DeliveryScope<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = self.previous;
    }
}

impl Shared {
    /// True while the connection opened as `generation` is still the live one.
    fn is_current(&self, generation: u64) -> bool {
        self.open.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }

    fn delivering_here(&self) -> bool {
        *self.delivering.lock() == Some(thread::current().id())
    }

    fn read_loop(&self, generation: u64, poll_interval: Duration) {
        while self.is_current(generation) {
            let chunk = {
                let mut port = self.port.lock();
                // Checked under the port lock: a restart swaps the port and
                // bumps the generation while holding it.
                if !self.is_current(generation) {
                    break;
                }
                match port.as_mut() {
                    Some(port) => port.read_available(),
                    None => break,
                }
            };

            match chunk {
                Ok(bytes) if bytes.is_empty() => thread::sleep(poll_interval),
                Ok(bytes) => self.deliver(&bytes, generation),
                Err(e) => {
                    if let Some(name) = self.close_transport(Some(generation)) {
                        error!("Serial read failed, closing session: {}", e);
                        info!(port = %name, "Serial session closed after read failure");
                    }
                    break;
                }
            }
        }
        debug!(generation, "Serial reader exiting");
    }

    fn deliver(&self, data: &[u8], generation: u64) {
        let _delivery = self.delivery.lock();
        if !self.is_current(generation) {
            debug!("Ignoring {} byte(s) received while closed", data.len());
            return;
        }
        let _scope = DeliveryScope::enter(&self.delivering);

        let submissions = self.framer.lock().push_bytes(data);
        for text in submissions {
            // A subscriber may have stopped or restarted the session mid-batch.
            if !self.is_current(generation) {
                return;
            }
            self.resolve(text);
        }
    }

    fn resolve(&self, text: String) {
        match Submission::classify(text) {
            Submission::Handshake => {
                if self.ready.swap(true, Ordering::AcqRel) {
                    debug!("Repeated READY handshake ignored");
                } else {
                    info!("Board reported READY");
                }
            }
            Submission::Message(text) => {
                let subscribers: Vec<(SubscriptionId, Subscriber)> = self
                    .subscribers
                    .lock()
                    .iter()
                    .map(|(id, subscriber)| (*id, Arc::clone(subscriber)))
                    .collect();

                if subscribers.is_empty() {
                    debug!("No subscriber, dropping submission {:?}", text);
                    return;
                }
                debug!("Submission {:?}", text);

                let gone: Vec<SubscriptionId> = subscribers
                    .into_iter()
                    .filter_map(|(id, subscriber)| (!subscriber(text.as_str())).then_some(id))
                    .collect();
                if !gone.is_empty() {
                    debug!("Dropping {} closed subscriber(s)", gone.len());
                    self.subscribers
                        .lock()
                        .retain(|(id, _)| !gone.contains(id));
                }
            }
        }
    }

    /// Mark closed and release the port.
    ///
    /// With `Some(generation)` nothing happens unless that connection is still
    /// the live one. Returns the name of the port that was released.
    fn close_transport(&self, generation: Option<u64>) -> Option<String> {
        let port = {
            let mut port = self.port.lock();
            if generation.is_some_and(|g| self.generation.load(Ordering::Acquire) != g) {
                return None;
            }
            self.open.store(false, Ordering::Release);
            port.take()
        };
        self.ready.store(false, Ordering::Release);
        self.framer.lock().reset();

        port.map(|port| port.name().to_string())
    }
}

/// A connection to one board.
///
/// Dropping the session stops it, which closes the port.
///
/// # Example
/// ```no_run
/// use arduino_serial::{BoardProfile, SerialSession};
///
/// let session = SerialSession::with_port(&BoardProfile::uno(), "/dev/ttyACM0");
/// session.subscribe(|line| println!("board: {line}"));
/// if session.start(None).is_ok() {
///     // ... wait for session.is_ready() ...
///     let _ = session.send_command("LED ON");
/// }
/// session.stop();
/// ```
pub struct SerialSession {
    shared: Arc<Shared>,
    opener: Arc<dyn PortOpener>,
    reader: Mutex<Option<JoinHandle<()>>>,
    lifecycle: Mutex<()>,
}

impl SerialSession {
    /// A closed session on real hardware.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_opener(config, SystemPortOpener)
    }

    /// A closed session that acquires its port through `opener`.
    pub fn with_opener(config: SessionConfig, opener: impl PortOpener + 'static) -> Self {
        let framer = LineFramer::new(config.delimiter);
        Self {
            shared: Arc::new(Shared {
                config: Mutex::new(config),
                port: Mutex::new(None),
                framer: Mutex::new(framer),
                delivery: ReentrantMutex::new(()),
                delivering: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                open: AtomicBool::new(false),
                ready: AtomicBool::new(false),
            }),
            opener: Arc::new(opener),
            reader: Mutex::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// A session for `board` on the highest numbered port of this platform.
    pub fn for_board(board: &BoardProfile) -> Self {
        let port_name = find_highest_port(default_port_prefix());
        Self::new(SessionConfig::for_board(board, port_name))
    }

    /// A session for `board` on an explicit port.
    pub fn with_port(board: &BoardProfile, port_name: impl Into<String>) -> Self {
        Self::new(SessionConfig::for_board(board, port_name))
    }

    /// Open the port and start listening.
    ///
    /// A non-blank `port_name` replaces the configured one first. Open
    /// failures are logged and returned; the session stays closed and the
    /// caller may ignore the result and poll [`is_open`](Self::is_open).
    pub fn start(&self, port_name: Option<&str>) -> SessionResult<()> {
        let _lifecycle = self.lifecycle.lock();

        if self.shared.open.load(Ordering::Acquire) {
            let current = self.port_name();
            warn!(port = %current, "start called on an open session");
            return Err(SessionError::AlreadyOpen(current));
        }

        if let Some(name) = port_name.map(str::trim).filter(|name| !name.is_empty()) {
            self.shared.config.lock().port_name = name.to_string();
        }
        let config = self.shared.config.lock().clone();

        // A reader that stopped on a read failure still needs reaping.
        let stale = self.reader.lock().take();
        self.join_reader(stale);

        let port = match self.opener.open(&config.port_name, &config.port) {
            Ok(port) => port,
            Err(source) => {
                match &source {
                    PortError::PermissionDenied(_) => {
                        error!(port = %config.port_name, "Port is in use or access was denied")
                    }
                    e => error!(port = %config.port_name, "Failed to open serial port: {}", e),
                }
                return Err(SessionError::Open {
                    port: config.port_name,
                    source,
                });
            }
        };

        self.shared.framer.lock().reset();
        self.shared.ready.store(false, Ordering::Release);
        let generation = {
            let mut slot = self.shared.port.lock();
            let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
            *slot = Some(port);
            self.shared.open.store(true, Ordering::Release);
            generation
        };

        let shared = Arc::clone(&self.shared);
        let poll_interval = config.poll_interval;
        let spawned = thread::Builder::new()
            .name(format!("serial-reader {}", config.port_name))
            .spawn(move || shared.read_loop(generation, poll_interval));

        match spawned {
            Ok(handle) => *self.reader.lock() = Some(handle),
            Err(e) => {
                error!("Failed to spawn serial reader: {}", e);
                self.shared.close_transport(None);
                return Err(SessionError::Port(PortError::Io(e)));
            }
        }

        info!(
            port = %config.port_name,
            baud_rate = config.port.baud_rate,
            "Serial session opened"
        );
        Ok(())
    }

    /// Close the port and forget readiness. Safe to call at any time, repeatedly,
    /// and from inside a subscriber.
    ///
    /// Called from any other thread, it returns once the reader has exited, so
    /// no subscriber runs for the closed connection afterwards.
    pub fn stop(&self) {
        let handle = {
            let _lifecycle = self.lifecycle.lock();
            let handle = self.reader.lock().take();
            if let Some(name) = self.shared.close_transport(None) {
                info!(port = %name, "Serial session closed");
            }
            handle
        };

        // Inside a delivery the reader is either this thread or blocked on
        // this thread's delivery lock. It sees the closed state and exits.
        if self.shared.delivering_here() {
            return;
        }
        self.join_reader(handle);
    }

    /// Write `command` and a newline, then pause for the configured delay.
    ///
    /// Refused with [`SessionError::NotOpen`] or [`SessionError::NotReady`]
    /// (nothing is written) until the board has completed its handshake.
    pub fn send_command(&self, command: &str) -> SessionResult<()> {
        let delay = self.write_command(command)?;
        thread::sleep(delay);
        Ok(())
    }

    /// [`send_command`](Self::send_command) for async callers; the pause is a
    /// timer rather than a blocked thread.
    pub async fn send_command_async(&self, command: &str) -> SessionResult<()> {
        let delay = self.write_command(command)?;
        tokio::time::sleep(delay).await;
        Ok(())
    }

    fn write_command(&self, command: &str) -> SessionResult<Duration> {
        if !self.is_open() {
            debug!("Dropping command {:?}: session closed", command);
            return Err(SessionError::NotOpen);
        }
        if !self.is_ready() {
            debug!("Dropping command {:?}: board not ready", command);
            return Err(SessionError::NotReady);
        }

        {
            let mut port = self.shared.port.lock();
            let port = port.as_mut().ok_or(SessionError::NotOpen)?;
            port.write_line(command).map_err(|e| {
                warn!("Failed to send {:?}: {}", command, e);
                SessionError::Port(e)
            })?;
        }
        debug!("Sent command {:?}", command);

        Ok(self.shared.config.lock().command_delay)
    }

    /// Feed bytes as if the transport had just delivered them.
    ///
    /// The reader thread calls this for every read. Ignored while closed.
    pub fn handle_incoming(&self, data: &[u8]) {
        let generation = self.shared.generation.load(Ordering::Acquire);
        self.shared.deliver(data, generation);
    }

    /// Register a callback for every non-handshake submission.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.register(Arc::new(move |text: &str| {
            subscriber(text);
            true
        }))
    }

    fn register(&self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.shared.subscribers.lock().push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.shared.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Receive submissions on a channel instead of a callback.
    ///
    /// The subscription is removed with the first submission after the
    /// receiver is dropped.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(Arc::new(move |text: &str| tx.send(text.to_string()).is_ok()));
        rx
    }

    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// True once the board has sent its handshake on the current connection.
    pub fn is_ready(&self) -> bool {
        self.is_open() && self.shared.ready.load(Ordering::Acquire)
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_open() {
            SessionStatus::Open {
                ready: self.is_ready(),
            }
        } else {
            SessionStatus::Closed
        }
    }

    pub fn port_name(&self) -> String {
        self.shared.config.lock().port_name.clone()
    }

    /// Takes effect on the next [`start`](Self::start).
    pub fn set_port_name(&self, port_name: impl Into<String>) {
        let port_name = port_name.into();
        if self.is_open() {
            debug!("Port name changed to {} while open; applies on next start", port_name);
        }
        self.shared.config.lock().port_name = port_name;
    }

    pub fn baud_rate(&self) -> u32 {
        self.shared.config.lock().port.baud_rate
    }

    /// Takes effect on the next [`start`](Self::start).
    pub fn set_baud_rate(&self, baud_rate: u32) {
        if self.is_open() {
            debug!("Baud rate changed to {} while open; applies on next start", baud_rate);
        }
        self.shared.config.lock().port.baud_rate = baud_rate;
    }

    /// Adopt the board's communication parameters.
    pub fn set_board(&self, board: &BoardProfile) {
        self.set_baud_rate(board.baud_rate);
    }

    pub fn delimiter(&self) -> char {
        self.shared.framer.lock().delimiter()
    }

    /// Change the end-of-submission character. A partial submission is dropped.
    pub fn set_delimiter(&self, delimiter: char) {
        self.shared.framer.lock().set_delimiter(delimiter);
        self.shared.config.lock().delimiter = delimiter;
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> SessionConfig {
        self.shared.config.lock().clone()
    }

    fn join_reader(&self, handle: Option<JoinHandle<()>>) {
        let Some(handle) = handle else { return };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            error!("Serial reader thread panicked");
        }
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SerialSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSession")
            .field("port_name", &self.port_name())
            .field("status", &self.status())
            .field("delimiter", &self.delimiter())
            .finish()
    }
}

//! Session supervision.
//!
//! The remote channel is one ordered byte stream, so exactly one operation
//! may touch a session at a time. All demands, the periodic poll tick
//! included, go through a single worker thread's queue and are drained
//! strictly in arrival order. The worker also owns the reconnect/backoff
//! loop.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::session::{SshTransport, Transport};
use crate::error::{BridgeError, Result};
use crate::events::{BridgeEvent, ChatEvent};
use crate::protocol::{ComHeuristics, ProtocolAdapter};
use crate::router::{self, RoutedIntent};

/// Produces a fresh authenticated transport for each (re)connect attempt.
pub type TransportFactory = Box<dyn Fn(&Config) -> Result<Box<dyn Transport>> + Send>;

type Reply<T> = Sender<Result<T>>;

enum Request {
    Connect(Reply<()>),
    EnterRoom(Reply<()>),
    SendText(String, Reply<()>),
    RawCommand(String, Reply<()>),
    ReadRecent(usize, Reply<Vec<ChatEvent>>),
    LeaveRoom(Reply<()>),
    Disconnect(Reply<()>),
    Route(String, Reply<RouteOutcome>),
    Shutdown,
}

/// What happened to a routed operator message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// `com:` text delivered to the room.
    ChatDelivered,
    /// `sh:` command typed into the remote.
    CommandDelivered,
    /// No prefix; the bridge did nothing.
    Ignored,
}

/// Backoff bookkeeping for the reconnect loop.
#[derive(Debug, Clone)]
struct ReconnectState {
    attempts: u32,
    delay: Duration,
    exhausted: bool,
}

impl ReconnectState {
    fn new(config: &Config) -> Self {
        Self {
            attempts: 0,
            delay: Duration::from_millis(config.reconnect.base_delay_ms),
            exhausted: false,
        }
    }

    fn reset(&mut self, config: &Config) {
        *self = Self::new(config);
    }

    /// Current delay, doubling for next time up to the configured cap.
    fn next_delay(&mut self, config: &Config) -> Duration {
        let current = self.delay;
        let cap = Duration::from_millis(config.reconnect.max_delay_ms);
        self.delay = (current * 2).min(cap);
        current
    }
}

/// Handle to a session worker. Cloneable senders are not exposed; callers
/// block on a reply channel, bounded by the worker's own timeouts.
pub struct SessionSupervisor {
    tx: Sender<Request>,
    worker: Option<JoinHandle<()>>,
}

impl SessionSupervisor {
    /// Spawn a supervisor that dials SSH per the config.
    pub fn spawn(config: Config, events: Sender<BridgeEvent>) -> Self {
        let factory: TransportFactory = Box::new(|config: &Config| {
            let t = SshTransport::dial(
                &config.connection.host,
                config.connection.port,
                &config.connection.username,
                &config.connection.secret,
                config.screen.cols,
                config.screen.rows,
                config.connect_timeout(),
            )?;
            Ok(Box::new(t) as Box<dyn Transport>)
        });
        Self::spawn_with_factory(config, events, factory)
    }

    /// Spawn with a custom transport factory (tests use scripted ones).
    pub fn spawn_with_factory(
        config: Config,
        events: Sender<BridgeEvent>,
        factory: TransportFactory,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            Worker::new(config, events, factory, rx).run();
        });
        Self {
            tx,
            worker: Some(worker),
        }
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(build(reply_tx))
            .map_err(|_| BridgeError::SessionClosed)?;
        reply_rx.recv().map_err(|_| BridgeError::SessionClosed)?
    }

    /// Establish the session (or report success if already connected).
    /// Also the explicit re-trigger after `ReconnectExhausted`.
    pub fn connect(&self) -> Result<()> {
        self.request(Request::Connect)
    }

    pub fn enter_room(&self) -> Result<()> {
        self.request(Request::EnterRoom)
    }

    pub fn send_text(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        self.request(|reply| Request::SendText(text, reply))
    }

    pub fn raw_command(&self, command: &str) -> Result<()> {
        let command = command.to_string();
        self.request(|reply| Request::RawCommand(command, reply))
    }

    pub fn read_recent(&self, count: usize) -> Result<Vec<ChatEvent>> {
        self.request(|reply| Request::ReadRecent(count, reply))
    }

    pub fn leave_room(&self) -> Result<()> {
        self.request(Request::LeaveRoom)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.request(Request::Disconnect)
    }

    /// Classify operator text and dispatch it.
    pub fn route(&self, text: &str) -> Result<RouteOutcome> {
        let text = text.to_string();
        self.request(|reply| Request::Route(text, reply))
    }

    /// Stop the worker and wait for it to exit. Dropping the handle does
    /// the same; this form just makes the teardown point explicit.
    pub fn shutdown(self) {}
}

impl Drop for SessionSupervisor {
    fn drop(&mut self) {
        let _ = self.tx.send(Request::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct Worker {
    config: Config,
    events: Sender<BridgeEvent>,
    factory: TransportFactory,
    rx: Receiver<Request>,
    adapter: ProtocolAdapter,
    reconnect: ReconnectState,
    /// Re-enter the room automatically after a successful reconnect.
    rejoin_room: bool,
    running: bool,
}

impl Worker {
    fn new(
        config: Config,
        events: Sender<BridgeEvent>,
        factory: TransportFactory,
        rx: Receiver<Request>,
    ) -> Self {
        let adapter = ProtocolAdapter::new(
            config.screen.cols,
            config.screen.rows,
            config.screen.scrollback_limit,
            Box::new(ComHeuristics::default()),
            config.adapter_options(),
        );
        let reconnect = ReconnectState::new(&config);
        Self {
            config,
            events,
            factory,
            rx,
            adapter,
            reconnect,
            rejoin_room: false,
            running: true,
        }
    }

    fn run(&mut self) {
        info!("session worker started");
        while self.running {
            match self.rx.recv_timeout(self.config.poll_interval()) {
                Ok(Request::Shutdown) => break,
                Ok(request) => self.handle(request),
                Err(RecvTimeoutError::Timeout) => self.tick(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        if self.adapter.is_connected() && self.adapter.in_room() {
            let _ = self.adapter.leave_room();
        }
        self.adapter.disconnect();
        info!("session worker stopped");
    }

    /// Poll tick: extract chat events and publish them. A transient error
    /// here starts the reconnect loop.
    fn tick(&mut self) {
        if !self.adapter.is_connected() || self.reconnect.exhausted {
            return;
        }
        match self.adapter.poll() {
            Ok(events) => {
                for event in events {
                    let _ = self.events.send(BridgeEvent::Chat(event));
                }
            }
            Err(e) if e.is_transient() => {
                warn!("poll failed: {e}");
                self.handle_drop();
            }
            Err(e) => warn!("poll error (non-transient): {e}"),
        }
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Connect(reply) => {
                // Explicit connect clears an exhausted reconnect state.
                self.reconnect.reset(&self.config);
                let result = if self.adapter.is_connected() {
                    Ok(())
                } else {
                    self.try_connect()
                };
                let _ = reply.send(result);
            }
            Request::EnterRoom(reply) => {
                let result = self.adapter.enter_room();
                if result.is_ok() {
                    self.rejoin_room = true;
                }
                let _ = reply.send(self.after_op(result));
            }
            Request::SendText(text, reply) => {
                let result = self.adapter.send_chat(&text);
                let _ = reply.send(self.after_op(result));
            }
            Request::RawCommand(command, reply) => {
                let result = self.adapter.send_raw_command(&command);
                let _ = reply.send(self.after_op(result));
            }
            Request::ReadRecent(count, reply) => {
                let _ = reply.send(Ok(self.adapter.read_recent(count)));
            }
            Request::LeaveRoom(reply) => {
                let result = self.adapter.leave_room();
                if result.is_ok() {
                    self.rejoin_room = false;
                }
                let _ = reply.send(self.after_op(result));
            }
            Request::Disconnect(reply) => {
                self.do_disconnect();
                let _ = reply.send(Ok(()));
            }
            Request::Route(text, reply) => {
                let result = match router::classify(&text) {
                    RoutedIntent::ChatSend(text) => self
                        .adapter
                        .send_chat(&text)
                        .map(|_| RouteOutcome::ChatDelivered),
                    RoutedIntent::RawCommand(command) => self
                        .adapter
                        .send_raw_command(&command)
                        .map(|_| RouteOutcome::CommandDelivered),
                    RoutedIntent::Conversation(_) => Ok(RouteOutcome::Ignored),
                };
                let _ = reply.send(self.after_op(result));
            }
            Request::Shutdown => self.running = false,
        }
    }

    /// Pass an operation result through, kicking off reconnect when the
    /// failure was transport-level.
    fn after_op<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_transient() {
                warn!("operation failed on transport: {e}");
                self.handle_drop();
            }
        }
        result
    }

    fn try_connect(&mut self) -> Result<()> {
        self.adapter.begin_connect();
        let transport = match (self.factory)(&self.config) {
            Ok(t) => t,
            Err(e) => {
                self.adapter.disconnect();
                return Err(e);
            }
        };
        self.adapter.establish(
            transport,
            &self.config.connection.secret,
            &self.config.login_policy(),
        )?;
        self.reconnect.reset(&self.config);
        let _ = self.events.send(BridgeEvent::Connected);
        if self.rejoin_room {
            self.adapter.enter_room()?;
        }
        Ok(())
    }

    fn do_disconnect(&mut self) {
        if self.adapter.is_connected() && self.adapter.in_room() {
            let _ = self.adapter.leave_room();
        }
        self.rejoin_room = false;
        self.adapter.disconnect();
        self.reconnect.reset(&self.config);
        let _ = self.events.send(BridgeEvent::Disconnected);
        self.flush_pending();
    }

    /// Answer everything already queued with `SessionClosed`.
    fn flush_pending(&mut self) {
        while let Ok(request) = self.rx.try_recv() {
            match request {
                Request::Connect(reply)
                | Request::EnterRoom(reply)
                | Request::SendText(_, reply)
                | Request::RawCommand(_, reply)
                | Request::LeaveRoom(reply)
                | Request::Disconnect(reply) => {
                    let _ = reply.send(Err(BridgeError::SessionClosed));
                }
                Request::ReadRecent(_, reply) => {
                    let _ = reply.send(Err(BridgeError::SessionClosed));
                }
                Request::Route(_, reply) => {
                    let _ = reply.send(Err(BridgeError::SessionClosed));
                }
                Request::Shutdown => self.running = false,
            }
        }
    }

    /// Transport dropped: publish the fact and retry with exponential
    /// backoff until success, cancellation, or the attempt ceiling.
    fn handle_drop(&mut self) {
        self.adapter.disconnect();
        let _ = self.events.send(BridgeEvent::Disconnected);

        loop {
            if self.reconnect.attempts >= self.config.reconnect.max_attempts {
                error!(
                    "reconnect exhausted after {} attempts",
                    self.reconnect.attempts
                );
                self.reconnect.exhausted = true;
                let _ = self.events.send(BridgeEvent::ReconnectExhausted);
                return;
            }
            self.reconnect.attempts += 1;
            let delay = self.reconnect.next_delay(&self.config);
            info!(
                "reconnect attempt {} of {} in {:?}",
                self.reconnect.attempts, self.config.reconnect.max_attempts, delay
            );

            // The backoff wait doubles as the request queue, so a
            // disconnect or shutdown cancels it immediately.
            match self.rx.recv_timeout(delay) {
                Ok(Request::Shutdown) => {
                    self.running = false;
                    return;
                }
                Ok(Request::Disconnect(reply)) => {
                    self.do_disconnect();
                    let _ = reply.send(Ok(()));
                    return;
                }
                Ok(Request::Connect(reply)) => {
                    self.reconnect.reset(&self.config);
                    let result = self.try_connect();
                    let ok = result.is_ok();
                    let _ = reply.send(result);
                    if ok {
                        return;
                    }
                }
                Ok(other) => {
                    // Anything else queued against a dead session.
                    self.reject(other);
                }
                Err(RecvTimeoutError::Timeout) => match self.try_connect() {
                    Ok(()) => {
                        info!("reconnected");
                        return;
                    }
                    Err(BridgeError::Auth(e)) => {
                        // Credentials went bad; retrying cannot help.
                        error!("reconnect hit auth failure: {e}");
                        self.reconnect.exhausted = true;
                        let _ = self.events.send(BridgeEvent::ReconnectExhausted);
                        return;
                    }
                    Err(e) => warn!("reconnect attempt failed: {e}"),
                },
                Err(RecvTimeoutError::Disconnected) => {
                    self.running = false;
                    return;
                }
            }
        }
    }

    fn reject(&mut self, request: Request) {
        match request {
            Request::Connect(reply)
            | Request::EnterRoom(reply)
            | Request::SendText(_, reply)
            | Request::RawCommand(_, reply)
            | Request::LeaveRoom(reply)
            | Request::Disconnect(reply) => {
                let _ = reply.send(Err(BridgeError::SessionClosed));
            }
            Request::ReadRecent(_, reply) => {
                let _ = reply.send(Err(BridgeError::SessionClosed));
            }
            Request::Route(_, reply) => {
                let _ = reply.send(Err(BridgeError::SessionClosed));
            }
            Request::Shutdown => self.running = false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::testing::ScriptedTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    fn quick_config() -> Config {
        let mut config = Config::default();
        config.timing.poll_interval_ms = 20;
        config.timing.connect_timeout_secs = 1;
        config.timing.login_settle_ms = 20;
        config.timing.prompt_wait_ms = 100;
        config.reconnect.max_attempts = 3;
        config.reconnect.base_delay_ms = 10;
        config.reconnect.max_delay_ms = 50;
        config
    }

    /// Login banner plus a few quiet reads so the settle window can elapse
    /// before the script runs out.
    fn login_script() -> Vec<&'static [u8]> {
        vec![b"login ok\n" as &[u8], b"", b"", b""]
    }

    /// Factory failing `failures` times, then handing out healthy quiet
    /// transports.
    fn flaky_factory(failures: usize) -> (TransportFactory, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory: TransportFactory = Box::new(move |_config: &Config| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(BridgeError::Network(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )))
            } else {
                let (t, _) = ScriptedTransport::new(login_script());
                Ok(Box::new(t) as Box<dyn Transport>)
            }
        });
        (factory, calls)
    }

    fn drain_until<F: Fn(&BridgeEvent) -> bool>(
        rx: &Receiver<BridgeEvent>,
        pred: F,
        timeout: Duration,
    ) -> Vec<BridgeEvent> {
        let deadline = Instant::now() + timeout;
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            if let Ok(event) = rx.recv_timeout(Duration::from_millis(20)) {
                let done = pred(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
        }
        seen
    }

    #[test]
    fn connect_publishes_connected_event() {
        let (events_tx, events_rx) = mpsc::channel();
        let (factory, _) = flaky_factory(0);
        let supervisor =
            SessionSupervisor::spawn_with_factory(quick_config(), events_tx, factory);
        supervisor.connect().unwrap();
        let seen = drain_until(
            &events_rx,
            |e| *e == BridgeEvent::Connected,
            Duration::from_secs(1),
        );
        assert!(seen.contains(&BridgeEvent::Connected));
    }

    #[test]
    fn failures_then_success_recovers_and_resets() {
        // Connect succeeds, the transport dies, and the next three factory
        // calls fail before one succeeds: the worker must come back up.
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory: TransportFactory = Box::new(move |_config: &Config| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            match n {
                0 => {
                    let (mut t, _) = ScriptedTransport::new(login_script());
                    t.fail_after_script = true;
                    Ok(Box::new(t) as Box<dyn Transport>)
                }
                1 | 2 => Err(BridgeError::Network(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                ))),
                _ => {
                    let (t, _) = ScriptedTransport::new(login_script());
                    Ok(Box::new(t) as Box<dyn Transport>)
                }
            }
        });

        let (events_tx, events_rx) = mpsc::channel();
        let supervisor =
            SessionSupervisor::spawn_with_factory(quick_config(), events_tx, factory);
        supervisor.connect().unwrap();

        let seen = drain_until(
            &events_rx,
            |e| *e == BridgeEvent::ReconnectExhausted,
            Duration::from_secs(2),
        );
        // Recovered inside the attempt ceiling: connected twice, never
        // exhausted.
        assert!(!seen.contains(&BridgeEvent::ReconnectExhausted), "{seen:?}");
        assert_eq!(
            seen.iter()
                .filter(|e| **e == BridgeEvent::Connected)
                .count(),
            2,
            "{seen:?}"
        );
        assert!(calls.load(Ordering::SeqCst) >= 4);
    }

    #[test]
    fn exhaustion_emits_event_and_parks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        // First connect works, transport dies, every reconnect fails.
        let factory: TransportFactory = Box::new(move |_config: &Config| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                let (mut t, _) = ScriptedTransport::new(login_script());
                t.fail_after_script = true;
                Ok(Box::new(t) as Box<dyn Transport>)
            } else {
                Err(BridgeError::Network(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )))
            }
        });

        let (events_tx, events_rx) = mpsc::channel();
        let supervisor =
            SessionSupervisor::spawn_with_factory(quick_config(), events_tx, factory);
        supervisor.connect().unwrap();

        let seen = drain_until(
            &events_rx,
            |e| *e == BridgeEvent::ReconnectExhausted,
            Duration::from_secs(2),
        );
        assert!(seen.contains(&BridgeEvent::ReconnectExhausted), "{seen:?}");

        // Parked: no further factory calls from idle ticks.
        let parked_calls = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(150));
        assert_eq!(calls.load(Ordering::SeqCst), parked_calls);

        // An explicit connect re-triggers dialing.
        let _ = supervisor.connect();
        assert!(calls.load(Ordering::SeqCst) > parked_calls);
    }

    #[test]
    fn send_before_connect_is_not_connected() {
        let (events_tx, _events_rx) = mpsc::channel();
        let (factory, _) = flaky_factory(0);
        let supervisor =
            SessionSupervisor::spawn_with_factory(quick_config(), events_tx, factory);
        let err = supervisor.raw_command("ls").unwrap_err();
        assert!(matches!(err, BridgeError::NotConnected));
    }

    #[test]
    fn route_conversation_is_ignored_without_session() {
        let (events_tx, _events_rx) = mpsc::channel();
        let (factory, _) = flaky_factory(0);
        let supervisor =
            SessionSupervisor::spawn_with_factory(quick_config(), events_tx, factory);
        // No connection needed: conversation text never touches the remote.
        assert_eq!(supervisor.route("hello there").unwrap(), RouteOutcome::Ignored);
    }

    #[test]
    fn route_with_leading_whitespace_stays_conversation() {
        let (events_tx, _events_rx) = mpsc::channel();
        let (factory, _) = flaky_factory(0);
        let supervisor =
            SessionSupervisor::spawn_with_factory(quick_config(), events_tx, factory);
        // The prefix must sit at byte zero; padded input never becomes a
        // remote keystroke.
        assert_eq!(supervisor.route(" com: hi").unwrap(), RouteOutcome::Ignored);
        assert_eq!(supervisor.route("\tsh: ls").unwrap(), RouteOutcome::Ignored);
    }

    #[test]
    fn command_between_polls_keeps_write_order() {
        // A command submitted while ticks are polling must reach the wire
        // only through its own request, and bytes consumed around it must
        // still surface exactly once.
        let written_slot: Arc<Mutex<Option<Arc<Mutex<Vec<u8>>>>>> =
            Arc::new(Mutex::new(None));
        let slot = written_slot.clone();
        let factory: TransportFactory = Box::new(move |_config: &Config| {
            let (mut t, written) = ScriptedTransport::new(login_script());
            t.reads.push_back(b"[ada] msg one\r\n".to_vec());
            t.reads.push_back(Vec::new());
            t.reads.push_back(b"[ada] msg two\r\n".to_vec());
            *slot.lock().unwrap() = Some(written);
            Ok(Box::new(t) as Box<dyn Transport>)
        });

        let (events_tx, events_rx) = mpsc::channel();
        let supervisor =
            SessionSupervisor::spawn_with_factory(quick_config(), events_tx, factory);
        supervisor.connect().unwrap();

        // First poll has completed once msg one comes out.
        let seen = drain_until(
            &events_rx,
            |e| matches!(e, BridgeEvent::Chat(c) if c.text == "msg one"),
            Duration::from_secs(1),
        );
        assert!(
            seen.iter()
                .any(|e| matches!(e, BridgeEvent::Chat(c) if c.text == "msg one")),
            "{seen:?}"
        );

        let written = written_slot.lock().unwrap().clone().unwrap();
        // Polling alone never writes.
        assert!(written.lock().unwrap().is_empty());

        supervisor.raw_command("who").unwrap();
        // The reply came back, so the write already hit the transport.
        assert!(written.lock().unwrap().ends_with(b"who\n"));

        // Whatever the command's own screen pump swallowed still comes out,
        // and only once.
        let seen = drain_until(
            &events_rx,
            |e| matches!(e, BridgeEvent::Chat(c) if c.text == "msg two"),
            Duration::from_secs(1),
        );
        assert_eq!(
            seen.iter()
                .filter(|e| matches!(e, BridgeEvent::Chat(c) if c.text == "msg two"))
                .count(),
            1,
            "{seen:?}"
        );
        let after = drain_until(&events_rx, |_| false, Duration::from_millis(100));
        assert!(
            !after
                .iter()
                .any(|e| matches!(e, BridgeEvent::Chat(c) if c.text == "msg two")),
            "{after:?}"
        );
    }

    #[test]
    fn disconnect_while_disconnected_is_fine() {
        let (events_tx, _events_rx) = mpsc::channel();
        let (factory, _) = flaky_factory(0);
        let supervisor =
            SessionSupervisor::spawn_with_factory(quick_config(), events_tx, factory);
        supervisor.disconnect().unwrap();
        supervisor.disconnect().unwrap();
    }

    #[test]
    fn poll_publishes_chat_events() {
        let (events_tx, events_rx) = mpsc::channel();
        let factory: TransportFactory = Box::new(|_config: &Config| {
            let (mut t, _) = ScriptedTransport::new(login_script());
            // One chat line arrives after login, then the line stays quiet.
            t.reads.push_back(b"[alice] ping\r\n".to_vec());
            Ok(Box::new(t) as Box<dyn Transport>)
        });
        let supervisor =
            SessionSupervisor::spawn_with_factory(quick_config(), events_tx, factory);
        supervisor.connect().unwrap();
        let seen = drain_until(
            &events_rx,
            |e| matches!(e, BridgeEvent::Chat(c) if c.sender == "alice"),
            Duration::from_secs(1),
        );
        assert!(
            seen.iter()
                .any(|e| matches!(e, BridgeEvent::Chat(c) if c.text == "ping")),
            "{seen:?}"
        );
    }
}

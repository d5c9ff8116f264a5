//! Protocol adapter: screen diffing and keystroke synthesis.
//!
//! Owns one [`RemoteSession`] and one [`Screen`]. Each poll drains newly
//! arrived bytes into the screen, diffs the visible rows against the
//! previous snapshot, and extracts chat events; outbound intents are
//! rendered into the exact keystrokes the remote's modal interface expects.

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::heuristics::ScreenHeuristics;
use super::RoomMode;
use crate::core::session::{LoginPolicy, RemoteSession, Transport};
use crate::core::term::{Screen, ScreenSnapshot, VtParser};
use crate::error::{BridgeError, Result};
use crate::events::ChatEvent;

/// Tunables for the adapter's bounded waits and buffers.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// How long to wait for the input prompt after a mode keystroke.
    pub prompt_wait: Duration,
    /// Quiet time after a room command before judging its outcome.
    pub settle: Duration,
    /// Consecutive unparseable polls tolerated before forcing Unknown.
    pub desync_limit: u32,
    /// Ring size for `read_recent`.
    pub recent_limit: usize,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            prompt_wait: Duration::from_secs(2),
            settle: Duration::from_millis(300),
            desync_limit: 5,
            recent_limit: 100,
        }
    }
}

pub struct ProtocolAdapter {
    session: RemoteSession,
    screen: Screen,
    parser: VtParser,
    heuristics: Box<dyn ScreenHeuristics>,
    opts: AdapterOptions,
    mode: RoomMode,
    prev: ScreenSnapshot,
    room: String,
    in_room: bool,
    desync_ticks: u32,
    /// Text of the last outbound send, suppressed once if it echoes back.
    last_sent: Option<String>,
    recent: VecDeque<ChatEvent>,
}

impl ProtocolAdapter {
    pub fn new(
        cols: u16,
        rows: u16,
        scrollback_limit: usize,
        heuristics: Box<dyn ScreenHeuristics>,
        opts: AdapterOptions,
    ) -> Self {
        Self {
            session: RemoteSession::new(),
            screen: Screen::new(cols, rows, scrollback_limit),
            parser: VtParser::new(),
            heuristics,
            opts,
            mode: RoomMode::Unknown,
            prev: ScreenSnapshot::empty(rows),
            room: "unknown".to_string(),
            in_room: false,
            desync_ticks: 0,
            last_sent: None,
            recent: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> RoomMode {
        self.mode
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Mark the session as dialing while a fresh transport is produced.
    pub fn begin_connect(&mut self) {
        self.session.begin_connect();
    }

    pub fn in_room(&self) -> bool {
        self.in_room
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Attach an authenticated transport and run the login watch. Resets
    /// all screen and mode state; sends are untrusted until a probe.
    pub fn establish(
        &mut self,
        transport: Box<dyn Transport>,
        secret: &str,
        policy: &LoginPolicy,
    ) -> Result<()> {
        self.screen.reset();
        self.parser = VtParser::new();
        self.prev = ScreenSnapshot::empty(self.screen.rows);
        self.mode = RoomMode::Unknown;
        self.in_room = false;
        self.desync_ticks = 0;
        self.last_sent = None;
        self.session.establish(transport, secret, policy)
    }

    pub fn disconnect(&mut self) {
        self.session.disconnect();
        self.mode = RoomMode::Unknown;
        self.in_room = false;
    }

    /// Drain arrived bytes into the screen, answering any terminal queries
    /// the remote raised (cursor position, device attributes).
    fn pump(&mut self) -> Result<()> {
        let bytes = self.session.receive_available()?;
        if bytes.is_empty() {
            return Ok(());
        }
        let responses = self.parser.feed_bytes(&bytes, &mut self.screen);
        for response in responses {
            self.session.send_raw(&response.to_bytes())?;
        }
        Ok(())
    }

    /// One poll tick: ingest output, diff the screen, emit new chat events.
    ///
    /// Diffing is by row position with scroll attribution, not by content
    /// hash: a message that merely scrolled to a new row is not re-emitted.
    pub fn poll(&mut self) -> Result<Vec<ChatEvent>> {
        self.pump()?;
        let snap = self.screen.snapshot();

        let mut events = Vec::new();
        let scrolled = snap.scrolled_total.saturating_sub(self.prev.scrolled_total) as usize;
        let rows = snap.lines.len();

        for r in 0..rows {
            let line = &snap.lines[r];
            // Where this row's content sat in the previous snapshot. Only
            // rows inside the scroll region move; a status line pinned
            // above or below it stays put.
            let in_region = r >= snap.scroll_top as usize && r <= snap.scroll_bottom as usize;
            let prev_index = if in_region { r + scrolled } else { r };
            let revealed = in_region && prev_index > snap.scroll_bottom as usize;
            let is_new = if revealed {
                !line.trim().is_empty()
            } else {
                match self.prev.lines.get(prev_index) {
                    Some(old) => line != old,
                    None => !line.trim().is_empty(),
                }
            };
            if !is_new {
                continue;
            }
            if let Some(event) = self.extract_event(line) {
                events.push(event);
            }
        }

        self.track_mode(&snap);
        self.prev = snap;
        self.last_sent = None;

        for event in &events {
            self.recent.push_back(event.clone());
            while self.recent.len() > self.opts.recent_limit {
                self.recent.pop_front();
            }
        }
        Ok(events)
    }

    fn extract_event(&self, line: &str) -> Option<ChatEvent> {
        if self.heuristics.is_noise(line) {
            return None;
        }
        if let Some(sent) = &self.last_sent {
            // Local echo of our own keystrokes is not a room message.
            if line.trim() == sent.trim() {
                debug!("suppressing echo: {line:?}");
                return None;
            }
        }
        let event = match self.heuristics.parse_line(line) {
            Some((sender, text)) => ChatEvent::new(self.room.clone(), sender, text),
            // Best-effort system message.
            None => ChatEvent::new(self.room.clone(), "", line.trim()),
        };
        Some(event)
    }

    fn track_mode(&mut self, snap: &ScreenSnapshot) {
        match self.heuristics.detect_mode(snap) {
            RoomMode::Unknown => {
                self.desync_ticks += 1;
                if self.desync_ticks > self.opts.desync_limit {
                    if self.mode != RoomMode::Unknown {
                        warn!(
                            "screen unreconcilable for {} polls, mode forced to unknown",
                            self.desync_ticks
                        );
                    }
                    self.mode = RoomMode::Unknown;
                }
            }
            detected => {
                self.desync_ticks = 0;
                self.mode = detected;
            }
        }
    }

    /// Resolve `Unknown` by sending a harmless keystroke and reading the
    /// resulting screen shape.
    fn probe(&mut self) -> Result<()> {
        debug!("probing remote mode");
        self.session.send_raw(b"\r")?;
        let deadline = Instant::now() + self.opts.prompt_wait;
        loop {
            self.pump()?;
            let snap = self.screen.snapshot();
            match self.heuristics.detect_mode(&snap) {
                RoomMode::Unknown => {
                    if Instant::now() >= deadline {
                        return Err(BridgeError::ProtocolDesync(
                            "probe produced no recognizable screen".into(),
                        ));
                    }
                    thread::sleep(Duration::from_millis(20));
                }
                detected => {
                    self.mode = detected;
                    self.desync_ticks = 0;
                    return Ok(());
                }
            }
        }
    }

    fn ensure_command_mode(&mut self) -> Result<()> {
        match self.mode {
            RoomMode::Command => Ok(()),
            RoomMode::Input => {
                // Finish the open input line; the remote drops back to
                // command mode after accepting it.
                self.session.send_raw(b"\n")?;
                self.mode = RoomMode::Command;
                Ok(())
            }
            RoomMode::Unknown => {
                self.probe()?;
                if self.mode == RoomMode::Input {
                    self.session.send_raw(b"\n")?;
                    self.mode = RoomMode::Command;
                }
                Ok(())
            }
        }
    }

    /// Send one chat line: space keystroke, wait for the input prompt, then
    /// the text and a newline. A first prompt timeout forces a re-probe and
    /// one retry before surfacing `ModeTimeout`.
    pub fn send_chat(&mut self, text: &str) -> Result<()> {
        self.ensure_command_mode()?;
        match self.try_send_chat(text) {
            Err(BridgeError::ModeTimeout(_)) => {
                warn!("input prompt missing, re-probing once");
                self.mode = RoomMode::Unknown;
                self.probe()?;
                self.ensure_command_mode()?;
                self.try_send_chat(text)
            }
            other => other,
        }
    }

    fn try_send_chat(&mut self, text: &str) -> Result<()> {
        self.session.send_raw(b" ")?;
        self.wait_for_input_prompt()?;
        self.session.send_raw(text.as_bytes())?;
        self.session.send_raw(b"\n")?;
        self.mode = RoomMode::Command;
        self.last_sent = Some(text.to_string());
        info!("chat line sent ({} bytes)", text.len());
        Ok(())
    }

    fn wait_for_input_prompt(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.opts.prompt_wait;
        loop {
            self.pump()?;
            let snap = self.screen.snapshot();
            if self.heuristics.detect_mode(&snap) == RoomMode::Input {
                self.mode = RoomMode::Input;
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BridgeError::ModeTimeout("input prompt".into()));
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    /// Type a raw command and newline in command mode. No response shape is
    /// awaited beyond the channel accepting the write.
    pub fn send_raw_command(&mut self, text: &str) -> Result<()> {
        self.ensure_command_mode()?;
        self.session.send_raw(text.as_bytes())?;
        self.session.send_raw(b"\n")?;
        self.last_sent = Some(text.to_string());
        Ok(())
    }

    /// Sugar for the room-change command.
    pub fn go_to_room(&mut self, name: &str) -> Result<()> {
        self.send_raw_command(&format!("g {name}"))?;
        self.room = name.to_string();
        Ok(())
    }

    /// Enter the chat room from the login shell and wait for its banner.
    pub fn enter_room(&mut self) -> Result<()> {
        self.session.send_raw(b"com\n")?;
        let deadline = Instant::now() + self.opts.prompt_wait;
        loop {
            thread::sleep(self.opts.settle.min(Duration::from_millis(50)));
            self.pump()?;
            let snap = self.screen.snapshot();
            let joined = snap.lines.join("\n");
            if joined.to_uppercase().contains("COM") || joined.contains('>') {
                self.in_room = true;
                self.mode = RoomMode::Unknown; // probe before the first send
                self.prev = snap;
                info!("entered chat room");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BridgeError::Timeout("room banner".into()));
            }
        }
    }

    /// Quit back to the shell.
    pub fn leave_room(&mut self) -> Result<()> {
        if !self.in_room {
            return Ok(());
        }
        self.ensure_command_mode()?;
        self.session.send_raw(b"/q\n")?;
        self.in_room = false;
        self.mode = RoomMode::Unknown;
        info!("left chat room");
        Ok(())
    }

    /// Last `count` extracted events, oldest first.
    pub fn read_recent(&self, count: usize) -> Vec<ChatEvent> {
        let skip = self.recent.len().saturating_sub(count);
        self.recent.iter().skip(skip).cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn swap_transport_for_test(&mut self, transport: Box<dyn Transport>) {
        self.session.replace_transport(transport);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::testing::ScriptedTransport;
    use crate::protocol::ComHeuristics;
    use std::sync::{Arc, Mutex};

    fn quick_policy() -> LoginPolicy {
        LoginPolicy {
            timeout: Duration::from_millis(500),
            settle: Duration::from_millis(20),
            reprompt_limit: 2,
        }
    }

    fn quick_opts() -> AdapterOptions {
        AdapterOptions {
            prompt_wait: Duration::from_millis(200),
            settle: Duration::from_millis(10),
            desync_limit: 5,
            recent_limit: 10,
        }
    }

    /// Adapter that already passed login, with `reads` queued for polling.
    /// Login happens against a separate transport so its bytes never leak
    /// into the poll path.
    fn connected_adapter(reads: Vec<&[u8]>) -> (ProtocolAdapter, Arc<Mutex<Vec<u8>>>) {
        let (login, _) = ScriptedTransport::new(vec![b"ok\n"]);
        let mut adapter = ProtocolAdapter::new(
            40,
            5,
            100,
            Box::new(ComHeuristics::default()),
            quick_opts(),
        );
        adapter
            .establish(Box::new(login), "secret", &quick_policy())
            .unwrap();
        let (transport, written) = ScriptedTransport::new(reads);
        adapter.swap_transport_for_test(Box::new(transport));
        (adapter, written)
    }

    #[test]
    fn poll_extracts_new_chat_lines() {
        let (mut adapter, _) = connected_adapter(vec![b"[alice] hello world\r\n"]);
        let events = adapter.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sender, "alice");
        assert_eq!(events[0].text, "hello world");
    }

    #[test]
    fn poll_twice_with_no_output_is_idempotent() {
        let (mut adapter, _) = connected_adapter(vec![b"[alice] once only\r\n"]);
        assert_eq!(adapter.poll().unwrap().len(), 1);
        assert_eq!(adapter.poll().unwrap().len(), 0);
    }

    #[test]
    fn scrolled_lines_are_not_re_emitted() {
        // 5-row screen; fill it, then append one more line so everything
        // shifts up. Only the appended line may come out.
        let (mut adapter, _) = connected_adapter(vec![
            b"[alice] msg one\r\n[alice] msg two\r\n[alice] msg three\r\n[alice] msg four\r\n",
        ]);
        let first = adapter.poll().unwrap();
        assert_eq!(first.len(), 4);

        let (transport, _) = ScriptedTransport::new(vec![b"[bob] msg five\r\n"]);
        adapter.swap_transport_for_test(Box::new(transport));
        let second = adapter.poll().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].sender, "bob");
    }

    #[test]
    fn region_scroll_under_status_line_is_not_re_emitted() {
        // A status line pinned above a `CSI 2;5r` scroll region: when the
        // region scrolls, the shifted messages must not come out again.
        let setup: &[u8] = b"\x1b[2;5r\
            \x1b[1;1H*** server status ***\
            \x1b[2;1H[u] msg one\
            \x1b[3;1H[u] msg two\
            \x1b[4;1H[u] msg three\
            \x1b[5;1H[u] msg four";
        let update: &[u8] = b"\r\n[u] msg five";
        let (mut adapter, _) = connected_adapter(vec![setup, b"", update]);

        let first = adapter.poll().unwrap();
        assert_eq!(first.len(), 4);

        let second = adapter.poll().unwrap();
        assert_eq!(second.len(), 1, "{second:?}");
        assert_eq!(second[0].text, "msg five");
    }

    #[test]
    fn noise_lines_are_dropped() {
        let (mut adapter, _) =
            connected_adapter(vec![b"Welcome to COM chat\r\n[admin] notice\r\n[carol] real\r\n"]);
        let events = adapter.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sender, "carol");
    }

    #[test]
    fn unformatted_new_line_becomes_system_event() {
        let (mut adapter, _) = connected_adapter(vec![b"*** topic changed to rust\r\n"]);
        let events = adapter.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sender, "");
        assert_eq!(events[0].text, "*** topic changed to rust");
    }

    #[test]
    fn send_chat_emits_space_text_newline() {
        // Screen already shows command-mode content; the input prompt is
        // queued to appear once the space is sent.
        let (mut adapter, _) = connected_adapter(vec![b"[alice] hi\r\n"]);
        adapter.poll().unwrap();
        assert_eq!(adapter.mode(), RoomMode::Command);

        let (transport, written) = ScriptedTransport::new(vec![b"> "]);
        adapter.swap_transport_for_test(Box::new(transport));
        adapter.send_chat("hello").unwrap();
        assert_eq!(&written.lock().unwrap()[..], b" hello\n");
        assert_eq!(adapter.mode(), RoomMode::Command);
    }

    #[test]
    fn send_chat_times_out_without_prompt() {
        let (mut adapter, _) = connected_adapter(vec![b"[alice] hi\r\n"]);
        adapter.poll().unwrap();
        let err = adapter.send_chat("hello").unwrap_err();
        // Retried once via re-probe, then surfaced.
        assert!(matches!(
            err,
            BridgeError::ModeTimeout(_) | BridgeError::ProtocolDesync(_)
        ));
    }

    #[test]
    fn own_echo_is_suppressed() {
        let (mut adapter, _) = connected_adapter(vec![b"[alice] hi\r\n"]);
        adapter.poll().unwrap();

        let (transport, _) = ScriptedTransport::new(vec![b"> ", b"g lobby\r\n"]);
        adapter.swap_transport_for_test(Box::new(transport));
        adapter.send_raw_command("g lobby").unwrap();
        let events = adapter.poll().unwrap();
        assert!(events.is_empty(), "echo leaked: {events:?}");
    }

    #[test]
    fn go_to_room_types_the_g_command() {
        let (mut adapter, _) = connected_adapter(vec![b"[alice] hi\r\n"]);
        adapter.poll().unwrap();

        let (transport, written) = ScriptedTransport::new(vec![]);
        adapter.swap_transport_for_test(Box::new(transport));
        adapter.go_to_room("lobby").unwrap();
        assert_eq!(&written.lock().unwrap()[..], b"g lobby\n");
        assert_eq!(adapter.room(), "lobby");
    }

    #[test]
    fn enter_and_leave_room_keystrokes() {
        let (mut adapter, _) = connected_adapter(vec![]);
        let (transport, written) = ScriptedTransport::new(vec![b"COM lobby\r\n"]);
        adapter.swap_transport_for_test(Box::new(transport));
        adapter.enter_room().unwrap();
        assert!(adapter.in_room());
        assert!(written.lock().unwrap().starts_with(b"com\n"));

        let (transport, written) = ScriptedTransport::new(vec![b"[x] y\r\n"]);
        adapter.swap_transport_for_test(Box::new(transport));
        adapter.poll().unwrap();
        adapter.leave_room().unwrap();
        assert!(!adapter.in_room());
        assert!(written.lock().unwrap().ends_with(b"/q\n"));
    }

    #[test]
    fn read_recent_returns_tail() {
        let (mut adapter, _) = connected_adapter(vec![
            b"[a] one\r\n[b] two\r\n[c] three\r\n",
        ]);
        adapter.poll().unwrap();
        let recent = adapter.read_recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sender, "b");
        assert_eq!(recent[1].sender, "c");
    }
}

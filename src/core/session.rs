//! Remote session management.
//!
//! Owns one authenticated transport to the remote host. SSH-level
//! authentication happens in [`SshTransport::dial`]; some hosts then run a
//! second, in-band login inside the shell, so [`RemoteSession::establish`]
//! watches the byte stream for a password prompt and injects the secret
//! exactly once before declaring the session usable.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};

/// Lifecycle of the remote connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    /// Transport alive but the handshake failed; reconnect required.
    Degraded,
}

/// Byte-level channel to the remote host.
///
/// The ssh2 implementation is the only production transport; tests drive the
/// session with scripted in-memory transports.
pub trait Transport: Send {
    /// Non-blocking read. `Ok(0)` means nothing pending; an error means the
    /// channel is gone.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Best-effort close; must be idempotent.
    fn close(&mut self);
}

/// SSH transport over `ssh2` with a PTY-backed shell channel.
pub struct SshTransport {
    session: ssh2::Session,
    channel: ssh2::Channel,
}

impl SshTransport {
    /// Connect, authenticate, and open an interactive shell with a vt100
    /// pseudo-terminal sized to the virtual screen.
    pub fn dial(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
        cols: u16,
        rows: u16,
        timeout: Duration,
    ) -> Result<Self> {
        let tcp = Self::connect_tcp(host, port, timeout)?;
        tcp.set_read_timeout(Some(timeout)).map_err(BridgeError::Network)?;

        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout.as_millis() as u32);
        session.handshake()?;

        session
            .userauth_password(username, secret)
            .map_err(|e| BridgeError::Auth(e.to_string()))?;
        if !session.authenticated() {
            return Err(BridgeError::Auth("server rejected credentials".into()));
        }

        let mut channel = session.channel_session()?;
        channel.request_pty("vt100", None, Some((cols as u32, rows as u32, 0, 0)))?;
        channel.shell()?;

        // All subsequent reads are drained opportunistically.
        session.set_blocking(false);

        info!("SSH connected: {}:{}", host, port);
        Ok(Self { session, channel })
    }

    fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
        let addrs: Vec<_> = (host, port)
            .to_socket_addrs()
            .map_err(BridgeError::Network)?
            .collect();
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(tcp) => return Ok(tcp),
                Err(e) => last_err = e,
            }
        }
        Err(BridgeError::Network(last_err))
    }
}

impl Transport for SshTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.channel.read(buf) {
            Ok(0) => {
                if self.channel.eof() {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "ssh channel closed",
                    ))
                } else {
                    Ok(0)
                }
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        // Writes go through in blocking mode so short writes never truncate
        // a keystroke sequence.
        self.session.set_blocking(true);
        let result = self
            .channel
            .write_all(bytes)
            .and_then(|_| self.channel.flush());
        self.session.set_blocking(false);
        result
    }

    fn close(&mut self) {
        self.session.set_blocking(true);
        let _ = self.channel.close();
    }
}

/// Tunables for the in-band login watch.
#[derive(Debug, Clone)]
pub struct LoginPolicy {
    /// Give up if no recognizable prompt nor settled output arrives in time.
    pub timeout: Duration,
    /// Quiet period after output with no password prompt that counts as a
    /// successful login.
    pub settle: Duration,
    /// Password prompts tolerated after the secret was injected before the
    /// failure is classified as bad credentials.
    pub reprompt_limit: u32,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            settle: Duration::from_millis(700),
            reprompt_limit: 2,
        }
    }
}

/// One authenticated remote connection.
pub struct RemoteSession {
    transport: Option<Box<dyn Transport>>,
    state: SessionState,
}

impl Default for RemoteSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteSession {
    pub fn new() -> Self {
        Self {
            transport: None,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Mark the session as dialing a fresh transport; `establish` moves it
    /// on to `Authenticating` once the transport is attached.
    pub fn begin_connect(&mut self) {
        self.state = SessionState::Connecting;
    }

    /// Attach a transport and drive the login handshake: watch for a
    /// password prompt, inject the secret exactly once, and treat repeated
    /// prompts beyond the policy limit as bad credentials.
    pub fn establish(
        &mut self,
        transport: Box<dyn Transport>,
        secret: &str,
        policy: &LoginPolicy,
    ) -> Result<()> {
        self.transport = Some(transport);
        self.state = SessionState::Authenticating;

        let deadline = Instant::now() + policy.timeout;
        let mut window = String::new();
        let mut scanned = 0usize;
        let mut injected = false;
        let mut reprompts = 0u32;
        let mut last_output = None::<Instant>;
        let mut buf = [0u8; 4096];

        loop {
            let n = match self.transport.as_mut() {
                Some(t) => match t.read_available(&mut buf) {
                    Ok(n) => n,
                    Err(e) => {
                        self.state = SessionState::Disconnected;
                        self.transport = None;
                        return Err(BridgeError::Network(e));
                    }
                },
                None => return Err(BridgeError::NotConnected),
            };

            if n > 0 {
                window.push_str(&String::from_utf8_lossy(&buf[..n]).to_lowercase());
                last_output = Some(Instant::now());

                while let Some(pos) = window[scanned..].find("password") {
                    let after = scanned + pos + "password".len();
                    scanned = after;
                    // Only a prompt when it ends the output seen so far.
                    let tail = window[after..].trim_start_matches([':', ' ']);
                    if !tail.is_empty() {
                        continue;
                    }
                    if !injected {
                        debug!("password prompt detected, injecting secret");
                        self.write_transport(secret.as_bytes())?;
                        self.write_transport(b"\n")?;
                        injected = true;
                    } else {
                        reprompts += 1;
                        warn!("password prompt repeated ({} of {})", reprompts, policy.reprompt_limit);
                        if reprompts >= policy.reprompt_limit {
                            self.state = SessionState::Degraded;
                            return Err(BridgeError::Auth(
                                "password prompt repeated after injection".into(),
                            ));
                        }
                        self.write_transport(secret.as_bytes())?;
                        self.write_transport(b"\n")?;
                    }
                }

                // Keep the scan window bounded.
                if window.len() > 8192 {
                    let cut = window.len() - 4096;
                    window.drain(..cut);
                    scanned = scanned.saturating_sub(cut);
                }
            }

            // Prompts are answered as they are scanned, so settled output
            // means the login either succeeded or needed no second stage.
            if let Some(at) = last_output {
                if at.elapsed() >= policy.settle {
                    self.state = SessionState::Connected;
                    info!("session established");
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                self.state = SessionState::Degraded;
                return Err(BridgeError::Timeout("login prompt".into()));
            }

            thread::sleep(Duration::from_millis(20));
        }
    }

    fn write_transport(&mut self, bytes: &[u8]) -> Result<()> {
        match self.transport.as_mut() {
            Some(t) => t.write_all(bytes).map_err(|e| {
                self.state = SessionState::Disconnected;
                BridgeError::Network(e)
            }),
            None => Err(BridgeError::NotConnected),
        }
    }

    /// Write raw bytes; only legal on a connected session.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if self.state != SessionState::Connected {
            return Err(BridgeError::NotConnected);
        }
        let result = self.write_transport(bytes);
        if result.is_err() {
            self.transport = None;
        }
        result
    }

    /// Drain whatever bytes have arrived since the last call. Empty result
    /// means no pending data; channel closure tears the session down.
    pub fn receive_available(&mut self) -> Result<Vec<u8>> {
        if self.state != SessionState::Connected {
            return Err(BridgeError::NotConnected);
        }
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match self.transport.as_mut() {
                Some(t) => match t.read_available(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => out.extend_from_slice(&buf[..n]),
                    Err(e) => {
                        self.state = SessionState::Disconnected;
                        self.transport = None;
                        return Err(BridgeError::Network(e));
                    }
                },
                None => return Err(BridgeError::NotConnected),
            }
        }
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn replace_transport(&mut self, transport: Box<dyn Transport>) {
        self.transport = Some(transport);
        self.state = SessionState::Connected;
    }

    /// Best-effort close; idempotent.
    pub fn disconnect(&mut self) {
        if let Some(mut t) = self.transport.take() {
            t.close();
            info!("session disconnected");
        }
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Transport that replays a script of reads and records writes.
    pub struct ScriptedTransport {
        pub reads: VecDeque<Vec<u8>>,
        pub written: Arc<Mutex<Vec<u8>>>,
        pub fail_after_script: bool,
    }

    impl ScriptedTransport {
        pub fn new(reads: Vec<&[u8]>) -> (Self, Arc<Mutex<Vec<u8>>>) {
            let written = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    reads: reads.into_iter().map(|r| r.to_vec()).collect(),
                    written: written.clone(),
                    fail_after_script: false,
                },
                written,
            )
        }
    }

    impl Transport for ScriptedTransport {
        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => {
                    if self.fail_after_script {
                        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script over"))
                    } else {
                        Ok(0)
                    }
                }
            }
        }

        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }

        fn close(&mut self) {}
    }
}

//! Error taxonomy for the bridge.
//!
//! Transient faults (`Timeout`, `Network`) are retried by the supervisor's
//! backoff loop; `Auth` and `ReconnectExhausted` are surfaced to the caller
//! and require external intervention.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Credentials rejected by the remote host. Never retried automatically.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// An expected prompt or response did not arrive in time.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// Transport-level failure (connect, read, write, channel closure).
    #[error("network error: {0}")]
    Network(#[source] io::Error),

    /// Operation requires an established session.
    #[error("not connected")]
    NotConnected,

    /// The remote did not complete a command/input mode transition.
    #[error("mode transition timed out ({0})")]
    ModeTimeout(String),

    /// Screen shape unrecognized for too many consecutive polls.
    #[error("protocol desync: {0}")]
    ProtocolDesync(String),

    /// Reconnect attempt ceiling reached; terminal until explicit reconnect.
    #[error("reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    /// The session was closed while the request was queued or in flight.
    #[error("session closed")]
    SessionClosed,

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// SSH library failure during connect or handshake.
    #[error("ssh error: {0}")]
    Ssh(#[from] ssh2::Error),
}

impl From<io::Error> for BridgeError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                BridgeError::Timeout(e.to_string())
            }
            _ => BridgeError::Network(e),
        }
    }
}

impl BridgeError {
    /// Transient errors are eligible for the supervisor's reconnect loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Timeout(_) | BridgeError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

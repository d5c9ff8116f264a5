//! combridge: a bridge into a terminal-only chat room.
//!
//! Some multi-user chat rooms exist only behind an interactive SSH login:
//! no API, no wire protocol, just a full-screen terminal program. This
//! crate keeps such a session alive, interprets the remote's VT output
//! into a screen model, diffs that screen to recover chat messages, and
//! synthesizes keystrokes to speak back into the room.
//!
//! The public surface is [`SessionSupervisor`]: spawn it with a
//! [`Config`] and an event channel, then issue connect/send/read calls
//! from any thread. Everything that touches the remote runs on one
//! worker so the single byte stream is never interleaved.

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod protocol;
pub mod router;
pub mod supervisor;

pub use config::Config;
pub use error::{BridgeError, Result};
pub use events::{BridgeEvent, ChatEvent};
pub use protocol::{ProtocolAdapter, RoomMode};
pub use router::RoutedIntent;
pub use supervisor::{RouteOutcome, SessionSupervisor};

//! Protocol adaptation for the remote chat interface.
//!
//! The remote side has no machine-readable protocol, only a painted screen
//! with two modal states. This module tracks that state machine, extracts
//! chat lines from screen diffs, and renders outbound intents into the
//! exact keystrokes the interface expects.

pub mod adapter;
pub mod heuristics;

pub use adapter::ProtocolAdapter;
pub use heuristics::{ComHeuristics, ScreenHeuristics};

/// The remote interface's two mutually exclusive modes.
///
/// `Unknown` is the state right after (re)connect or after an unparseable
/// screen; sends are not trusted until a probe resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomMode {
    /// Keys are commands: room navigation, listing, quit.
    Command,
    /// Free text goes to the room; ends with a newline.
    Input,
    Unknown,
}

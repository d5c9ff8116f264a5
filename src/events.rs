//! Events published to the external bus.

use std::time::SystemTime;

/// One chat message extracted from the remote screen.
///
/// Immutable once emitted; ownership passes to the event bus.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    /// Best-effort room tag; "unknown" until a room change is observed.
    pub room: String,
    /// Sender handle; empty for system/banner lines that matched no format.
    pub sender: String,
    pub text: String,
    pub observed_at: SystemTime,
}

impl ChatEvent {
    pub fn new(room: impl Into<String>, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            sender: sender.into(),
            text: text.into(),
            observed_at: SystemTime::now(),
        }
    }
}

/// Everything the bridge publishes, chat plus lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Chat(ChatEvent),
    Connected,
    Disconnected,
    ReconnectExhausted,
}

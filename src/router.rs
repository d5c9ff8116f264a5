//! Prefix routing for inbound operator text.
//!
//! The host agent runtime translates natural language into one of two
//! literal prefixes before handing text to the bridge; anything else is
//! ordinary conversation and never touches the remote session.
//!
//! The prefix must sit at byte position zero. `" com: x"` is conversation,
//! not a chat send: loosely formatted input must never turn into remote
//! keystrokes by accident.

/// What an inbound operator message asks the bridge to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedIntent {
    /// `com:` text destined for the chat room.
    ChatSend(String),
    /// `sh:` a raw command typed into the remote interface.
    RawCommand(String),
    /// No prefix; the bridge ignores it.
    Conversation(String),
}

/// Classify one operator message. Case-insensitive prefixes, payload
/// trimmed; an empty payload is still a valid send.
pub fn classify(raw: &str) -> RoutedIntent {
    if let Some(rest) = strip_prefix_ci(raw, "com:") {
        RoutedIntent::ChatSend(rest.trim().to_string())
    } else if let Some(rest) = strip_prefix_ci(raw, "sh:") {
        RoutedIntent::RawCommand(rest.trim().to_string())
    } else {
        RoutedIntent::Conversation(raw.to_string())
    }
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

//! Screen interpretation heuristics.
//!
//! Deciding what on a painted screen is a chat message, a prompt, or a
//! banner is inherently fuzzy; there is no handshake to ask. The rules live
//! behind a trait so a different remote interface (or a better guess for
//! this one) can be swapped in without touching the mode state machine.

use super::RoomMode;
use crate::core::term::ScreenSnapshot;

/// Replaceable strategy for reading meaning out of screen lines.
pub trait ScreenHeuristics: Send {
    /// True for prompts, banners, blank lines, and other non-chat artifacts.
    fn is_noise(&self, line: &str) -> bool;

    /// Parse a chat line into (sender, text). `None` means the line matches
    /// no known format; the caller emits it as a system message instead.
    fn parse_line(&self, line: &str) -> Option<(String, String)>;

    /// Judge the interface mode from the visible screen shape.
    fn detect_mode(&self, snapshot: &ScreenSnapshot) -> RoomMode;
}

/// Default heuristics for the COM chat interface.
///
/// Chat lines look like `[handle] text`, `<handle> text`, or
/// `handle: text`. Lines carrying server housekeeping vocabulary and lines
/// authored by pseudo-users are filtered as noise. In input mode COM paints
/// a `> ` prompt on the cursor row.
pub struct ComHeuristics {
    noise_keywords: Vec<&'static str>,
    system_users: Vec<&'static str>,
    min_line_len: usize,
}

impl Default for ComHeuristics {
    fn default() -> Self {
        Self {
            noise_keywords: vec![
                "welcome",
                "connected",
                "disconnected",
                "system",
                "server",
                "online",
            ],
            system_users: vec!["system", "server", "bot", "admin"],
            min_line_len: 3,
        }
    }
}

impl ComHeuristics {
    pub const INPUT_PROMPT: &'static str = "> ";

    fn split_sender(line: &str) -> Option<(&str, &str)> {
        let line = line.trim();
        let (closer, rest) = match line.as_bytes().first()? {
            b'<' => (Some('>'), &line[1..]),
            b'[' => (Some(']'), &line[1..]),
            _ => (None, line),
        };

        let sender_end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if sender_end == 0 {
            return None;
        }
        let (sender, tail) = rest.split_at(sender_end);

        let tail = match closer {
            Some(c) => tail.strip_prefix(c)?,
            // Bare handles need a colon terminator.
            None => tail.strip_prefix(':')?,
        };
        let text = tail.trim_start_matches(':').trim();
        if text.is_empty() {
            return None;
        }
        Some((sender, text))
    }
}

impl ScreenHeuristics for ComHeuristics {
    fn is_noise(&self, line: &str) -> bool {
        let line = line.trim();
        if line.len() < self.min_line_len {
            return true;
        }
        if line.starts_with(Self::INPUT_PROMPT) {
            return true;
        }
        let lower = line.to_lowercase();
        if self.noise_keywords.iter().any(|kw| lower.contains(kw)) {
            return true;
        }
        if let Some((sender, _)) = Self::split_sender(line) {
            let sender = sender.to_lowercase();
            if self.system_users.iter().any(|u| *u == sender) {
                return true;
            }
        }
        false
    }

    fn parse_line(&self, line: &str) -> Option<(String, String)> {
        Self::split_sender(line).map(|(s, t)| (s.to_string(), t.to_string()))
    }

    fn detect_mode(&self, snapshot: &ScreenSnapshot) -> RoomMode {
        if snapshot.lines.iter().all(|l| l.trim().is_empty()) {
            return RoomMode::Unknown;
        }
        let cursor_line = snapshot
            .lines
            .get(snapshot.cursor_row as usize)
            .map(String::as_str)
            .unwrap_or("");
        if cursor_line.starts_with(Self::INPUT_PROMPT) || cursor_line.trim_end() == ">" {
            RoomMode::Input
        } else {
            RoomMode::Command
        }
    }
}

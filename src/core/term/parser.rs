//! Permissive ANSI/VT sequence parser.
//!
//! Interprets the remote byte stream into [`Screen`] mutations. The remote
//! interface is not a controlled protocol, so parsing is deliberately
//! lenient: unrecognized sequences are swallowed and logged, never fatal.

use super::state::{AttrFlags, Color, Screen};

/// Reply that must be written back to the remote channel.
#[derive(Debug, Clone)]
pub enum Response {
    /// Cursor position report: ESC [ row ; col R
    CursorPosition(u16, u16),
    /// Device attributes response
    DeviceAttributes,
    /// Secondary device attributes response
    SecondaryDeviceAttributes,
}

impl Response {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::CursorPosition(row, col) => format!("\x1b[{};{}R", row, col).into_bytes(),
            Response::DeviceAttributes => b"\x1b[?62;c".to_vec(),
            Response::SecondaryDeviceAttributes => b"\x1b[>1;10;0c".to_vec(),
        }
    }
}

/// Escape-sequence state machine.
pub struct VtParser {
    state: ParserState,
    params: Vec<u16>,
    intermediates: Vec<u8>,
    current_param: Option<u16>,
    osc_string: String,
    utf8_pending: Vec<u8>,
    utf8_remaining: usize,
}

#[derive(Clone, Copy, Default, PartialEq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    OscString,
    EscapeInOsc,
}

impl Default for VtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VtParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            params: Vec::with_capacity(16),
            intermediates: Vec::with_capacity(4),
            current_param: None,
            osc_string: String::new(),
            utf8_pending: Vec::with_capacity(4),
            utf8_remaining: 0,
        }
    }

    /// Feed a full chunk, writing back any generated responses.
    pub fn feed_bytes(&mut self, bytes: &[u8], screen: &mut Screen) -> Vec<Response> {
        let mut responses = Vec::new();
        for &b in bytes {
            if let Some(r) = self.feed(b, screen) {
                responses.push(r);
            }
        }
        responses
    }

    /// Feed a single byte.
    pub fn feed(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        // C0 controls act from any state except inside OSC strings.
        if byte < 0x20
            && self.state != ParserState::OscString
            && self.state != ParserState::EscapeInOsc
        {
            self.utf8_remaining = 0;
            self.utf8_pending.clear();
            match byte {
                0x1B => self.enter_escape(),
                0x07 => {} // BEL
                0x08 => screen.backspace(),
                0x09 => screen.horizontal_tab(),
                0x0A | 0x0B | 0x0C => screen.linefeed(),
                0x0D => screen.carriage_return(),
                _ => {}
            }
            return None;
        }

        match self.state {
            ParserState::Ground => self.ground(byte, screen),
            ParserState::Escape => self.escape(byte, screen),
            ParserState::EscapeIntermediate => self.escape_intermediate(byte),
            ParserState::CsiEntry => self.csi_entry(byte, screen),
            ParserState::CsiParam => self.csi_param(byte, screen),
            ParserState::CsiIntermediate => self.csi_intermediate(byte, screen),
            ParserState::OscString => self.osc(byte, screen),
            ParserState::EscapeInOsc => self.escape_in_osc(byte, screen),
        }
    }

    fn ground(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        if self.utf8_remaining > 0 {
            if byte & 0xC0 == 0x80 {
                self.utf8_pending.push(byte);
                self.utf8_remaining -= 1;
                if self.utf8_remaining == 0 {
                    match std::str::from_utf8(&self.utf8_pending) {
                        Ok(s) => {
                            for ch in s.chars() {
                                screen.put_char(ch);
                            }
                        }
                        Err(_) => screen.put_char('\u{FFFD}'),
                    }
                    self.utf8_pending.clear();
                }
                return None;
            }
            // Truncated sequence; drop it and reprocess this byte.
            self.utf8_pending.clear();
            self.utf8_remaining = 0;
            screen.put_char('\u{FFFD}');
        }

        match byte {
            0x20..=0x7E => screen.put_char(byte as char),
            0x7F => {} // DEL
            0xC2..=0xDF => self.start_utf8(byte, 1),
            0xE0..=0xEF => self.start_utf8(byte, 2),
            0xF0..=0xF4 => self.start_utf8(byte, 3),
            _ => screen.put_char('\u{FFFD}'),
        }
        None
    }

    fn start_utf8(&mut self, byte: u8, continuation: usize) {
        self.utf8_pending.clear();
        self.utf8_pending.push(byte);
        self.utf8_remaining = continuation;
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
    }

    fn escape(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        match byte {
            b'[' => {
                self.state = ParserState::CsiEntry;
                self.params.clear();
                self.intermediates.clear();
                self.current_param = None;
            }
            b']' => {
                self.state = ParserState::OscString;
                self.osc_string.clear();
            }
            b'7' => {
                screen.save_cursor();
                self.state = ParserState::Ground;
            }
            b'8' => {
                screen.restore_cursor();
                self.state = ParserState::Ground;
            }
            b'D' => {
                screen.linefeed();
                self.state = ParserState::Ground;
            }
            b'E' => {
                screen.carriage_return();
                screen.linefeed();
                self.state = ParserState::Ground;
            }
            b'M' => {
                screen.reverse_index();
                self.state = ParserState::Ground;
            }
            b'c' => {
                screen.reset();
                self.state = ParserState::Ground;
            }
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
            }
            _ => {
                self.state = ParserState::Ground;
            }
        }
        None
    }

    fn escape_intermediate(&mut self, byte: u8) -> Option<Response> {
        match byte {
            0x20..=0x2F => self.intermediates.push(byte),
            // Final byte; mostly charset selections, which we ignore.
            _ => self.state = ParserState::Ground,
        }
        None
    }

    fn csi_entry(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        match byte {
            b'0'..=b'9' => {
                self.current_param = Some((byte - b'0') as u16);
                self.state = ParserState::CsiParam;
            }
            b';' => {
                self.params.push(0);
                self.state = ParserState::CsiParam;
            }
            b'?' | b'>' | b'!' | b'=' => self.intermediates.push(byte),
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => return self.execute_csi(byte, screen),
            _ => self.state = ParserState::Ground,
        }
        None
    }

    fn csi_param(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            b';' | b':' => {
                self.params.push(self.current_param.unwrap_or(0));
                self.current_param = None;
            }
            0x20..=0x2F => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                return self.execute_csi(byte, screen);
            }
            _ => self.state = ParserState::Ground,
        }
        None
    }

    fn csi_intermediate(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        match byte {
            0x20..=0x2F => self.intermediates.push(byte),
            0x40..=0x7E => return self.execute_csi(byte, screen),
            _ => self.state = ParserState::Ground,
        }
        None
    }

    fn osc(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        match byte {
            0x07 => {
                self.execute_osc(screen);
                self.state = ParserState::Ground;
            }
            0x1B => self.state = ParserState::EscapeInOsc,
            0x9C => {
                self.execute_osc(screen);
                self.state = ParserState::Ground;
            }
            _ => self.osc_string.push(byte as char),
        }
        None
    }

    fn escape_in_osc(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        if byte == b'\\' {
            // ST (ESC \)
            self.execute_osc(screen);
            self.state = ParserState::Ground;
        } else {
            self.execute_osc(screen);
            self.enter_escape();
            return self.escape(byte, screen);
        }
        None
    }

    fn execute_csi(&mut self, final_byte: u8, screen: &mut Screen) -> Option<Response> {
        let is_private = self.intermediates.contains(&b'?');
        let is_gt = self.intermediates.contains(&b'>');
        let params = &self.params;
        let first = |d: u16| params.first().copied().unwrap_or(d);

        let response = match (is_private, is_gt, final_byte) {
            (false, false, b'A') => {
                screen.cursor_up(first(1).max(1));
                None
            }
            (false, false, b'B') => {
                screen.cursor_down(first(1).max(1));
                None
            }
            (false, false, b'C') => {
                screen.cursor_forward(first(1).max(1));
                None
            }
            (false, false, b'D') => {
                screen.cursor_backward(first(1).max(1));
                None
            }
            (false, false, b'E') => {
                screen.cursor_down(first(1).max(1));
                screen.carriage_return();
                None
            }
            (false, false, b'F') => {
                screen.cursor_up(first(1).max(1));
                screen.carriage_return();
                None
            }
            (false, false, b'G') => {
                screen.set_column(first(1));
                None
            }
            (false, false, b'H') | (false, false, b'f') => {
                let row = first(1);
                let col = params.get(1).copied().unwrap_or(1);
                screen.cursor_position(row, col);
                None
            }
            (false, false, b'd') => {
                screen.set_row(first(1));
                None
            }
            (false, false, b'J') => {
                screen.erase_in_display(first(0));
                None
            }
            (false, false, b'K') => {
                screen.erase_in_line(first(0));
                None
            }
            (false, false, b'L') => {
                screen.insert_lines(first(1).max(1));
                None
            }
            (false, false, b'M') => {
                screen.delete_lines(first(1).max(1));
                None
            }
            (false, false, b'@') => {
                screen.insert_chars(first(1).max(1));
                None
            }
            (false, false, b'P') => {
                screen.delete_chars(first(1).max(1));
                None
            }
            (false, false, b'X') => {
                screen.erase_chars(first(1).max(1));
                None
            }
            (false, false, b'S') => {
                screen.scroll_up(first(1).max(1));
                None
            }
            (false, false, b'T') => {
                screen.scroll_down(first(1).max(1));
                None
            }
            (false, false, b'r') => {
                let top = first(1);
                let bottom = params.get(1).copied().unwrap_or(screen.rows);
                screen.set_scroll_region(top, bottom);
                screen.cursor_position(1, 1);
                None
            }
            (false, false, b'm') => {
                self.execute_sgr(params, screen);
                None
            }
            (false, false, b's') => {
                screen.save_cursor();
                None
            }
            (false, false, b'u') => {
                screen.restore_cursor();
                None
            }
            (false, false, b'n') => match params.first() {
                Some(6) => {
                    let c = screen.cursor();
                    Some(Response::CursorPosition(c.row + 1, c.col + 1))
                }
                _ => None,
            },
            (false, false, b'c') => Some(Response::DeviceAttributes),
            (false, true, b'c') => Some(Response::SecondaryDeviceAttributes),
            (true, false, b'h') => {
                for &p in params {
                    screen.set_private_mode(p, true);
                }
                None
            }
            (true, false, b'l') => {
                for &p in params {
                    screen.set_private_mode(p, false);
                }
                None
            }
            (false, false, b'h') => {
                for &p in params {
                    match p {
                        4 => screen.modes.insert_mode = true,
                        20 => screen.modes.linefeed_newline = true,
                        _ => {}
                    }
                }
                None
            }
            (false, false, b'l') => {
                for &p in params {
                    match p {
                        4 => screen.modes.insert_mode = false,
                        20 => screen.modes.linefeed_newline = false,
                        _ => {}
                    }
                }
                None
            }
            _ => {
                tracing::debug!(
                    "Unknown CSI: intermediates={:?}, params={:?}, final={:?}",
                    self.intermediates,
                    params,
                    final_byte as char
                );
                None
            }
        };

        self.state = ParserState::Ground;
        response
    }

    fn execute_sgr(&self, params: &[u16], screen: &mut Screen) {
        if params.is_empty() {
            screen.current_attrs.reset();
            return;
        }

        let mut iter = params.iter().peekable();
        while let Some(&param) = iter.next() {
            match param {
                0 => screen.current_attrs.reset(),
                1 => screen.current_attrs.flags |= AttrFlags::BOLD,
                2 => screen.current_attrs.flags |= AttrFlags::DIM,
                3 => screen.current_attrs.flags |= AttrFlags::ITALIC,
                4 => screen.current_attrs.flags |= AttrFlags::UNDERLINE,
                5 => screen.current_attrs.flags |= AttrFlags::BLINK,
                7 => screen.current_attrs.flags |= AttrFlags::INVERSE,
                8 => screen.current_attrs.flags |= AttrFlags::HIDDEN,
                9 => screen.current_attrs.flags |= AttrFlags::STRIKETHROUGH,
                22 => screen.current_attrs.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
                23 => screen.current_attrs.flags &= !AttrFlags::ITALIC,
                24 => screen.current_attrs.flags &= !AttrFlags::UNDERLINE,
                25 => screen.current_attrs.flags &= !AttrFlags::BLINK,
                27 => screen.current_attrs.flags &= !AttrFlags::INVERSE,
                28 => screen.current_attrs.flags &= !AttrFlags::HIDDEN,
                29 => screen.current_attrs.flags &= !AttrFlags::STRIKETHROUGH,
                30..=37 => screen.current_attrs.fg = Color::Indexed((param - 30) as u8),
                38 => {
                    if let Some(&mode) = iter.next() {
                        match mode {
                            5 => {
                                if let Some(&n) = iter.next() {
                                    screen.current_attrs.fg = Color::Indexed(n as u8);
                                }
                            }
                            2 => {
                                let r = iter.next().copied().unwrap_or(0) as u8;
                                let g = iter.next().copied().unwrap_or(0) as u8;
                                let b = iter.next().copied().unwrap_or(0) as u8;
                                screen.current_attrs.fg = Color::Rgb(r, g, b);
                            }
                            _ => {}
                        }
                    }
                }
                39 => screen.current_attrs.fg = Color::Default,
                40..=47 => screen.current_attrs.bg = Color::Indexed((param - 40) as u8),
                48 => {
                    if let Some(&mode) = iter.next() {
                        match mode {
                            5 => {
                                if let Some(&n) = iter.next() {
                                    screen.current_attrs.bg = Color::Indexed(n as u8);
                                }
                            }
                            2 => {
                                let r = iter.next().copied().unwrap_or(0) as u8;
                                let g = iter.next().copied().unwrap_or(0) as u8;
                                let b = iter.next().copied().unwrap_or(0) as u8;
                                screen.current_attrs.bg = Color::Rgb(r, g, b);
                            }
                            _ => {}
                        }
                    }
                }
                49 => screen.current_attrs.bg = Color::Default,
                90..=97 => screen.current_attrs.fg = Color::Indexed((param - 90 + 8) as u8),
                100..=107 => screen.current_attrs.bg = Color::Indexed((param - 100 + 8) as u8),
                _ => {}
            }
        }
    }

    fn execute_osc(&mut self, screen: &mut Screen) {
        // OSC payload is "code;text"
        if let Some(pos) = self.osc_string.find(';') {
            let code = &self.osc_string[..pos];
            let text = &self.osc_string[pos + 1..];
            if matches!(code, "0" | "1" | "2") {
                screen.title = text.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut VtParser, screen: &mut Screen, bytes: &[u8]) -> Vec<Response> {
        parser.feed_bytes(bytes, screen)
    }

    #[test]
    fn cursor_movement() {
        let mut screen = Screen::new(80, 24, 0);
        let mut parser = VtParser::new();
        feed_all(&mut parser, &mut screen, b"\x1b[5;10H");
        assert_eq!(screen.cursor().row, 4);
        assert_eq!(screen.cursor().col, 9);
    }

    #[test]
    fn sgr_colors() {
        let mut screen = Screen::new(80, 24, 0);
        let mut parser = VtParser::new();
        feed_all(&mut parser, &mut screen, b"\x1b[31m");
        assert_eq!(screen.current_attrs.fg, Color::Indexed(1));
    }

    #[test]
    fn printable_text_lands_on_screen() {
        let mut screen = Screen::new(80, 24, 0);
        let mut parser = VtParser::new();
        feed_all(&mut parser, &mut screen, b"[alice] hi there\r\n");
        assert_eq!(screen.row_text(0), "[alice] hi there");
        assert_eq!(screen.cursor().row, 1);
    }

    #[test]
    fn unknown_csi_is_swallowed() {
        let mut screen = Screen::new(80, 24, 0);
        let mut parser = VtParser::new();
        feed_all(&mut parser, &mut screen, b"\x1b[?9999z\x1b[38;5;300mok");
        assert_eq!(screen.row_text(0), "ok");
    }

    #[test]
    fn cursor_position_report() {
        let mut screen = Screen::new(80, 24, 0);
        let mut parser = VtParser::new();
        let responses = feed_all(&mut parser, &mut screen, b"\x1b[3;7H\x1b[6n");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].to_bytes(), b"\x1b[3;7R");
    }

    #[test]
    fn utf8_multibyte_text() {
        let mut screen = Screen::new(80, 24, 0);
        let mut parser = VtParser::new();
        feed_all(&mut parser, &mut screen, "héllo".as_bytes());
        assert_eq!(screen.row_text(0), "héllo");
    }

    #[test]
    fn cursor_never_escapes_bounds() {
        let mut screen = Screen::new(20, 5, 10);
        let mut parser = VtParser::new();
        // Hostile mix of movement, erases, scrolls, and junk.
        let stream: &[u8] =
            b"\x1b[99;99H\x1b[999A\x1b[999Bxy\x1b[999C\x1b[2Jz\x1b[15Lw\x1b[88Xq\x1b[0;0Hok";
        feed_all(&mut parser, &mut screen, stream);
        assert!(screen.cursor().row < 5);
        assert!(screen.cursor().col <= 20);
    }

    #[test]
    fn osc_title_set() {
        let mut screen = Screen::new(80, 24, 0);
        let mut parser = VtParser::new();
        feed_all(&mut parser, &mut screen, b"\x1b]0;commode\x07body");
        assert_eq!(screen.title, "commode");
        assert_eq!(screen.row_text(0), "body");
    }
}

//! Virtual screen state.
//!
//! The bridge never renders anything; the screen exists so that the raw,
//! cursor-addressed output of the remote curses interface can be replayed
//! into a stable grid that the protocol adapter diffs between polls.

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

/// The virtual screen: a fixed grid of cells plus cursor and mode state,
/// mutated only by the VT parser.
pub struct Screen {
    pub cols: u16,
    pub rows: u16,
    pub primary: Grid,
    pub alternate: Grid,
    pub using_alternate: bool,
    pub primary_cursor: Cursor,
    pub alternate_cursor: Cursor,
    pub current_attrs: CellAttrs,
    pub modes: ScreenModes,
    pub title: String,
    /// Scroll region (top, bottom), 0-indexed inclusive.
    pub scroll_region: (u16, u16),
}

impl Screen {
    pub fn new(cols: u16, rows: u16, scrollback_limit: usize) -> Self {
        Self {
            cols,
            rows,
            primary: Grid::new(cols, rows, scrollback_limit),
            alternate: Grid::new(cols, rows, 0),
            using_alternate: false,
            primary_cursor: Cursor::default(),
            alternate_cursor: Cursor::default(),
            current_attrs: CellAttrs::default(),
            modes: ScreenModes::default(),
            title: String::new(),
            scroll_region: (0, rows.saturating_sub(1)),
        }
    }

    pub fn grid(&self) -> &Grid {
        if self.using_alternate {
            &self.alternate
        } else {
            &self.primary
        }
    }

    fn grid_mut(&mut self) -> &mut Grid {
        if self.using_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    pub fn cursor(&self) -> &Cursor {
        if self.using_alternate {
            &self.alternate_cursor
        } else {
            &self.primary_cursor
        }
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        if self.using_alternate {
            &mut self.alternate_cursor
        } else {
            &mut self.primary_cursor
        }
    }

    /// Write a printable character at the cursor and advance it.
    pub fn put_char(&mut self, ch: char) {
        let width = ch.width().unwrap_or(0) as u16;
        if width == 0 {
            // Combining character; attach to the previous cell.
            let (row, col) = self.cursor_pos();
            if col > 0 {
                self.grid_mut().rows[row].cells[col - 1].grapheme.push(ch);
            }
            return;
        }

        if self.cursor().col >= self.cols {
            if self.modes.auto_wrap {
                let row = self.cursor().row as usize;
                self.grid_mut().rows[row].wrapped = true;
                self.cursor_mut().col = 0;
                self.linefeed();
            } else {
                self.cursor_mut().col = self.cols.saturating_sub(1);
            }
        }

        let (row, col) = self.cursor_pos();
        let attrs = self.current_attrs.clone();
        let cols = self.cols as usize;

        let grid = self.grid_mut();
        grid.rows[row].cells[col] = Cell {
            grapheme: ch.to_string(),
            width: width as u8,
            attrs: attrs.clone(),
        };
        if width == 2 && col + 1 < cols {
            grid.rows[row].cells[col + 1] = Cell::continuation(&attrs);
        }

        self.cursor_mut().col += width;
    }

    fn cursor_pos(&self) -> (usize, usize) {
        let c = self.cursor();
        (
            (c.row as usize).min(self.rows.saturating_sub(1) as usize),
            (c.col as usize).min(self.cols.saturating_sub(1) as usize),
        )
    }

    pub fn carriage_return(&mut self) {
        self.cursor_mut().col = 0;
    }

    /// Move the cursor down, scrolling when at the bottom of the region.
    pub fn linefeed(&mut self) {
        let row = self.cursor().row;
        let bottom = self.scroll_region.1;
        if row >= bottom {
            self.scroll_up(1);
        } else if row < self.rows - 1 {
            self.cursor_mut().row += 1;
        }
    }

    pub fn backspace(&mut self) {
        let c = self.cursor_mut();
        c.col = c.col.saturating_sub(1);
    }

    pub fn horizontal_tab(&mut self) {
        let cols = self.cols;
        let c = self.cursor_mut();
        c.col = ((c.col / 8) + 1) * 8;
        if c.col >= cols {
            c.col = cols.saturating_sub(1);
        }
    }

    /// Shift rows inside the scroll region up by `n`, blanking the bottom.
    /// Rows leaving the top of the primary screen go to scrollback.
    pub fn scroll_up(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let cols = self.cols;
        let to_scrollback = !self.using_alternate && top == 0;

        let grid = self.grid_mut();
        for _ in 0..n {
            if (top as usize) < grid.rows.len() && (bottom as usize) < grid.rows.len() {
                let removed = grid.rows.remove(top as usize);
                // Every shift counts, even when the row is not eligible for
                // scrollback (region scrolls, alternate screen): the diff
                // needs the total to attribute row movement.
                grid.scrolled_total += 1;
                if to_scrollback {
                    grid.push_scrollback(removed);
                }
                grid.rows.insert(bottom as usize, Row::new(cols));
            }
        }
    }

    pub fn scroll_down(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let cols = self.cols;
        let grid = self.grid_mut();
        for _ in 0..n {
            if (bottom as usize) < grid.rows.len() {
                grid.rows.remove(bottom as usize);
                grid.rows.insert(top as usize, Row::new(cols));
            }
        }
    }

    pub fn cursor_up(&mut self, n: u16) {
        let c = self.cursor_mut();
        c.row = c.row.saturating_sub(n);
    }

    pub fn cursor_down(&mut self, n: u16) {
        let rows = self.rows;
        let c = self.cursor_mut();
        c.row = (c.row + n).min(rows.saturating_sub(1));
    }

    pub fn cursor_forward(&mut self, n: u16) {
        let cols = self.cols;
        let c = self.cursor_mut();
        c.col = (c.col + n).min(cols.saturating_sub(1));
    }

    pub fn cursor_backward(&mut self, n: u16) {
        let c = self.cursor_mut();
        c.col = c.col.saturating_sub(n);
    }

    /// Absolute cursor position (1-indexed parameters, clamped).
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        let rows = self.rows;
        let cols = self.cols;
        let c = self.cursor_mut();
        c.row = row.saturating_sub(1).min(rows.saturating_sub(1));
        c.col = col.saturating_sub(1).min(cols.saturating_sub(1));
    }

    pub fn set_column(&mut self, col: u16) {
        let cols = self.cols;
        self.cursor_mut().col = col.saturating_sub(1).min(cols.saturating_sub(1));
    }

    pub fn set_row(&mut self, row: u16) {
        let rows = self.rows;
        self.cursor_mut().row = row.saturating_sub(1).min(rows.saturating_sub(1));
    }

    pub fn erase_in_display(&mut self, mode: u16) {
        let (cursor_row, _) = self.cursor_pos();
        let rows = self.rows as usize;
        let attrs = self.current_attrs.clone();
        match mode {
            0 => {
                self.erase_in_line(0);
                let grid = self.grid_mut();
                for r in (cursor_row + 1)..rows {
                    if r < grid.rows.len() {
                        grid.rows[r].clear(&attrs);
                    }
                }
            }
            1 => {
                {
                    let grid = self.grid_mut();
                    for r in 0..cursor_row {
                        if r < grid.rows.len() {
                            grid.rows[r].clear(&attrs);
                        }
                    }
                }
                self.erase_in_line(1);
            }
            2 | 3 => {
                let grid = self.grid_mut();
                for r in 0..rows {
                    if r < grid.rows.len() {
                        grid.rows[r].clear(&attrs);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn erase_in_line(&mut self, mode: u16) {
        let (row, col) = self.cursor_pos();
        let cols = self.cols as usize;
        let attrs = self.current_attrs.clone();
        let grid = self.grid_mut();
        if row >= grid.rows.len() {
            return;
        }
        match mode {
            0 => {
                for c in col..cols {
                    if c < grid.rows[row].cells.len() {
                        grid.rows[row].cells[c].clear(&attrs);
                    }
                }
            }
            1 => {
                for c in 0..=col {
                    if c < grid.rows[row].cells.len() {
                        grid.rows[row].cells[c].clear(&attrs);
                    }
                }
            }
            2 => grid.rows[row].clear(&attrs),
            _ => {}
        }
    }

    pub fn insert_lines(&mut self, n: u16) {
        let (row, _) = self.cursor_pos();
        let total = self.rows as usize;
        let cols = self.cols;
        let grid = self.grid_mut();
        for _ in 0..n {
            if row < grid.rows.len() {
                grid.rows.insert(row, Row::new(cols));
                if grid.rows.len() > total {
                    grid.rows.pop();
                }
            }
        }
    }

    pub fn delete_lines(&mut self, n: u16) {
        let (row, _) = self.cursor_pos();
        let cols = self.cols;
        let grid = self.grid_mut();
        for _ in 0..n {
            if row < grid.rows.len() {
                grid.rows.remove(row);
                grid.rows.push(Row::new(cols));
            }
        }
    }

    pub fn insert_chars(&mut self, n: u16) {
        let (row, col) = self.cursor_pos();
        let grid = self.grid_mut();
        for _ in 0..n {
            if col < grid.rows[row].cells.len() {
                grid.rows[row].cells.pop();
                grid.rows[row].cells.insert(col, Cell::default());
            }
        }
    }

    pub fn delete_chars(&mut self, n: u16) {
        let (row, col) = self.cursor_pos();
        let grid = self.grid_mut();
        for _ in 0..n {
            if col < grid.rows[row].cells.len() {
                grid.rows[row].cells.remove(col);
                grid.rows[row].cells.push(Cell::default());
            }
        }
    }

    pub fn erase_chars(&mut self, n: u16) {
        let (row, col) = self.cursor_pos();
        let attrs = self.current_attrs.clone();
        let grid = self.grid_mut();
        for i in 0..n as usize {
            if col + i < grid.rows[row].cells.len() {
                grid.rows[row].cells[col + i].clear(&attrs);
            }
        }
    }

    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let rows = self.rows;
        let top = top.saturating_sub(1).min(rows.saturating_sub(1));
        let bottom = bottom.saturating_sub(1).min(rows.saturating_sub(1));
        if top < bottom {
            self.scroll_region = (top, bottom);
        }
    }

    pub fn save_cursor(&mut self) {
        let (col, row) = {
            let c = self.cursor();
            (c.col, c.row)
        };
        let attrs = self.current_attrs.clone();
        self.cursor_mut().saved = Some(SavedCursor { col, row, attrs });
    }

    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.cursor().saved.clone() {
            let c = self.cursor_mut();
            c.col = saved.col;
            c.row = saved.row;
            self.current_attrs = saved.attrs;
        }
    }

    pub fn reverse_index(&mut self) {
        if self.cursor().row == self.scroll_region.0 {
            self.scroll_down(1);
        } else {
            self.cursor_up(1);
        }
    }

    pub fn set_private_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            1 => self.modes.application_cursor = enable,
            7 => self.modes.auto_wrap = enable,
            25 => self.cursor_mut().visible = enable,
            47 | 1047 => {
                if enable {
                    self.using_alternate = true;
                    self.alternate = Grid::new(self.cols, self.rows, 0);
                } else {
                    self.using_alternate = false;
                }
            }
            1048 => {
                if enable {
                    self.save_cursor();
                } else {
                    self.restore_cursor();
                }
            }
            1049 => {
                if enable {
                    self.save_cursor();
                    self.using_alternate = true;
                    self.alternate = Grid::new(self.cols, self.rows, 0);
                    self.alternate_cursor = Cursor::default();
                } else {
                    self.using_alternate = false;
                    self.restore_cursor();
                }
            }
            2004 => self.modes.bracketed_paste = enable,
            _ => {} // Ignore unknown modes
        }
    }

    /// Full reset, keeping dimensions and the scrollback limit.
    pub fn reset(&mut self) {
        let limit = self.primary.scrollback_limit;
        *self = Screen::new(self.cols, self.rows, limit);
    }

    /// Visible text of one row, right-trimmed.
    pub fn row_text(&self, row: usize) -> String {
        let grid = self.grid();
        let mut out = String::new();
        if let Some(r) = grid.rows.get(row) {
            for cell in &r.cells {
                if cell.is_continuation() {
                    continue;
                }
                if cell.grapheme.is_empty() {
                    out.push(' ');
                } else {
                    out.push_str(&cell.grapheme);
                }
            }
        }
        out.truncate(out.trim_end().len());
        out
    }

    /// Immutable copy of the visible rows for diffing.
    pub fn snapshot(&self) -> ScreenSnapshot {
        ScreenSnapshot {
            lines: (0..self.rows as usize).map(|r| self.row_text(r)).collect(),
            cursor_row: self.cursor().row,
            cursor_col: self.cursor().col.min(self.cols),
            scrolled_total: self.grid().scrolled_total,
            scroll_top: self.scroll_region.0,
            scroll_bottom: self.scroll_region.1,
        }
    }
}

/// Point-in-time copy of the visible screen, superseded every poll tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSnapshot {
    pub lines: Vec<String>,
    pub cursor_row: u16,
    pub cursor_col: u16,
    /// Cumulative count of rows shifted off the top of the scroll region
    /// since the screen was created, region scrolls included. The diff
    /// uses the delta between snapshots to attribute row movement to
    /// scrolling rather than new content.
    pub scrolled_total: u64,
    /// Scroll region bounds at snapshot time; rows outside it do not move
    /// when the region scrolls.
    pub scroll_top: u16,
    pub scroll_bottom: u16,
}

impl ScreenSnapshot {
    pub fn empty(rows: u16) -> Self {
        Self {
            lines: vec![String::new(); rows as usize],
            cursor_row: 0,
            cursor_col: 0,
            scrolled_total: 0,
            scroll_top: 0,
            scroll_bottom: rows.saturating_sub(1),
        }
    }
}

/// Visible rows plus bounded scrollback.
pub struct Grid {
    pub rows: Vec<Row>,
    pub scrollback: Vec<Row>,
    pub scrollback_limit: usize,
    /// Monotonic count of rows ever shifted off the region top.
    pub scrolled_total: u64,
}

impl Grid {
    pub fn new(cols: u16, rows: u16, scrollback_limit: usize) -> Self {
        Self {
            rows: (0..rows).map(|_| Row::new(cols)).collect(),
            scrollback: Vec::new(),
            scrollback_limit,
            scrolled_total: 0,
        }
    }

    fn push_scrollback(&mut self, row: Row) {
        if self.scrollback_limit == 0 {
            return;
        }
        self.scrollback.push(row);
        if self.scrollback.len() > self.scrollback_limit {
            self.scrollback.remove(0);
        }
    }
}

/// A single row of cells.
pub struct Row {
    pub cells: Vec<Cell>,
    pub wrapped: bool,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            wrapped: false,
        }
    }

    pub fn clear(&mut self, attrs: &CellAttrs) {
        for cell in &mut self.cells {
            cell.clear(attrs);
        }
        self.wrapped = false;
    }
}

/// One character cell. Attributes are carried for fidelity only; nothing
/// downstream interprets them.
#[derive(Clone)]
pub struct Cell {
    pub grapheme: String,
    pub width: u8,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            grapheme: String::new(),
            width: 1,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    pub fn clear(&mut self, attrs: &CellAttrs) {
        self.grapheme.clear();
        self.width = 1;
        self.attrs = attrs.clone();
    }

    pub fn continuation(attrs: &CellAttrs) -> Self {
        Self {
            grapheme: String::new(),
            width: 0,
            attrs: attrs.clone(),
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }
}

#[derive(Clone, Default, PartialEq)]
pub struct CellAttrs {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl CellAttrs {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

bitflags! {
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct AttrFlags: u16 {
        const BOLD          = 0b0000_0001;
        const DIM           = 0b0000_0010;
        const ITALIC        = 0b0000_0100;
        const UNDERLINE     = 0b0000_1000;
        const BLINK         = 0b0001_0000;
        const INVERSE       = 0b0010_0000;
        const HIDDEN        = 0b0100_0000;
        const STRIKETHROUGH = 0b1000_0000;
    }
}

#[derive(Clone)]
pub struct Cursor {
    pub col: u16,
    pub row: u16,
    pub visible: bool,
    pub saved: Option<SavedCursor>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            visible: true,
            saved: None,
        }
    }
}

#[derive(Clone)]
pub struct SavedCursor {
    pub col: u16,
    pub row: u16,
    pub attrs: CellAttrs,
}

#[derive(Clone)]
pub struct ScreenModes {
    pub application_cursor: bool,
    pub auto_wrap: bool,
    pub insert_mode: bool,
    pub linefeed_newline: bool,
    pub bracketed_paste: bool,
}

impl Default for ScreenModes {
    fn default() -> Self {
        Self {
            application_cursor: false,
            auto_wrap: true,
            insert_mode: false,
            linefeed_newline: false,
            bracketed_paste: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(screen: &mut Screen, s: &str) {
        for ch in s.chars() {
            match ch {
                '\n' => {
                    screen.carriage_return();
                    screen.linefeed();
                }
                c => screen.put_char(c),
            }
        }
    }

    #[test]
    fn put_char_advances_cursor() {
        let mut screen = Screen::new(80, 24, 100);
        type_str(&mut screen, "hello");
        assert_eq!(screen.cursor().col, 5);
        assert_eq!(screen.row_text(0), "hello");
    }

    #[test]
    fn wrap_at_last_column() {
        let mut screen = Screen::new(4, 3, 100);
        type_str(&mut screen, "abcdef");
        assert_eq!(screen.row_text(0), "abcd");
        assert_eq!(screen.row_text(1), "ef");
        assert_eq!(screen.cursor().row, 1);
    }

    #[test]
    fn linefeed_on_last_row_scrolls() {
        let mut screen = Screen::new(10, 2, 100);
        type_str(&mut screen, "one\ntwo\nthree");
        assert_eq!(screen.row_text(0), "two");
        assert_eq!(screen.row_text(1), "three");
        assert_eq!(screen.primary.scrolled_total, 1);
        assert_eq!(screen.primary.scrollback.len(), 1);
    }

    #[test]
    fn scrollback_respects_limit() {
        let mut screen = Screen::new(10, 2, 3);
        for i in 0..10 {
            type_str(&mut screen, &format!("line{i}\n"));
        }
        assert!(screen.primary.scrollback.len() <= 3);
        assert_eq!(screen.primary.scrolled_total, 9);
    }

    #[test]
    fn region_scroll_counts_without_scrollback() {
        let mut screen = Screen::new(10, 6, 100);
        screen.set_scroll_region(2, 5);
        screen.scroll_up(1);
        // Rows leaving a mid-screen region never reach scrollback, but the
        // shift still counts.
        assert!(screen.primary.scrollback.is_empty());
        assert_eq!(screen.primary.scrolled_total, 1);
        assert_eq!(screen.snapshot().scroll_top, 1);
        assert_eq!(screen.snapshot().scroll_bottom, 4);
    }

    #[test]
    fn erase_in_line_from_cursor() {
        let mut screen = Screen::new(10, 2, 0);
        type_str(&mut screen, "abcdef");
        screen.cursor_position(1, 3);
        screen.erase_in_line(0);
        assert_eq!(screen.row_text(0), "ab");
    }

    #[test]
    fn alternate_screen_preserves_primary() {
        let mut screen = Screen::new(10, 2, 0);
        type_str(&mut screen, "keep");
        screen.set_private_mode(1049, true);
        type_str(&mut screen, "temp");
        assert_eq!(screen.row_text(0), "temp");
        screen.set_private_mode(1049, false);
        assert_eq!(screen.row_text(0), "keep");
    }

    #[test]
    fn wide_char_occupies_two_cells() {
        let mut screen = Screen::new(10, 2, 0);
        screen.put_char('漢');
        assert_eq!(screen.cursor().col, 2);
        assert!(screen.grid().rows[0].cells[1].is_continuation());
    }
}

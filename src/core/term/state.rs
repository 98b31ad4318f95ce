//! Terminal state management
//!
//! This module defines the terminal's cell grid, cursor state and
//! attributes, along with the dirty-line bookkeeping the renderer uses to
//! repaint only what changed.

use bitflags::bitflags;
use std::collections::HashSet;

/// Terminal state holding all screen data
pub struct TerminalState {
    pub cols: u16,
    pub rows: u16,
    grid: Vec<Vec<Cell>>,
    pub cursor: CursorState,
    pub current_attrs: CellAttrs,
    pub auto_wrap: bool,
    /// Scroll region (top, bottom) - 0-indexed, inclusive
    scroll_region: (u16, u16),
    dirty_lines: HashSet<usize>,
    full_redraw: bool,
}

impl TerminalState {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            grid: (0..rows).map(|_| blank_row(cols)).collect(),
            cursor: CursorState::default(),
            current_attrs: CellAttrs::default(),
            auto_wrap: true,
            scroll_region: (0, rows.saturating_sub(1)),
            dirty_lines: HashSet::new(),
            full_redraw: true,
        }
    }

    /// Cells of one grid line
    pub fn line(&self, row: usize) -> &[Cell] {
        &self.grid[row]
    }

    pub fn is_line_dirty(&self, row: usize) -> bool {
        self.full_redraw || self.dirty_lines.contains(&row)
    }

    pub fn has_dirty(&self) -> bool {
        self.full_redraw || !self.dirty_lines.is_empty()
    }

    /// Acknowledge a redraw; dirty lines are not redelivered
    pub fn clear_dirty(&mut self) {
        self.dirty_lines.clear();
        self.full_redraw = false;
    }

    fn mark_dirty(&mut self, row: usize) {
        self.dirty_lines.insert(row);
    }

    fn mark_all_dirty(&mut self) {
        self.full_redraw = true;
    }

    /// Put a character at the current cursor position
    pub fn put_char(&mut self, ch: char) {
        // Wrap only once the cursor is past the last column
        if self.cursor.col >= self.cols {
            if self.auto_wrap {
                self.cursor.col = 0;
                self.linefeed();
            } else {
                self.cursor.col = self.cols.saturating_sub(1);
            }
        }

        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        if col >= self.cols as usize || row >= self.rows as usize {
            return;
        }

        self.grid[row][col] = Cell {
            ch,
            attrs: self.current_attrs.clone(),
        };
        self.mark_dirty(row);
        self.cursor.col += 1;
    }

    /// Carriage return - move cursor to column 0
    pub fn carriage_return(&mut self) {
        self.cursor.col = 0;
    }

    /// Line feed - move cursor down, scroll if at the region bottom
    pub fn linefeed(&mut self) {
        if self.cursor.row >= self.scroll_region.1 {
            self.scroll_up(1);
        } else if self.cursor.row < self.rows - 1 {
            self.cursor.row += 1;
        }
    }

    /// Backspace - move cursor left
    pub fn backspace(&mut self) {
        self.cursor.col = self.cursor.col.saturating_sub(1);
    }

    /// Horizontal tab - next multiple-of-8 stop
    pub fn horizontal_tab(&mut self) {
        self.cursor.col = ((self.cursor.col / 8) + 1) * 8;
        if self.cursor.col >= self.cols {
            self.cursor.col = self.cols.saturating_sub(1);
        }
    }

    /// Scroll the region up by n lines
    pub fn scroll_up(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        for _ in 0..n {
            if (top as usize) < self.grid.len() && (bottom as usize) < self.grid.len() {
                self.grid.remove(top as usize);
                self.grid.insert(bottom as usize, blank_row(self.cols));
            }
        }
        self.mark_all_dirty();
    }

    /// Scroll the region down by n lines
    pub fn scroll_down(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        for _ in 0..n {
            if (bottom as usize) < self.grid.len() {
                self.grid.remove(bottom as usize);
                self.grid.insert(top as usize, blank_row(self.cols));
            }
        }
        self.mark_all_dirty();
    }

    /// Cursor up
    pub fn cursor_up(&mut self, n: u16) {
        self.cursor.row = self.cursor.row.saturating_sub(n);
    }

    /// Cursor down
    pub fn cursor_down(&mut self, n: u16) {
        self.cursor.row = (self.cursor.row + n).min(self.rows.saturating_sub(1));
    }

    /// Cursor forward (right)
    pub fn cursor_forward(&mut self, n: u16) {
        self.cursor.col = (self.cursor.col + n).min(self.cols.saturating_sub(1));
    }

    /// Cursor backward (left)
    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor.col = self.cursor.col.saturating_sub(n);
    }

    /// Set cursor position (1-indexed parameters)
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        self.cursor.row = row.saturating_sub(1).min(self.rows.saturating_sub(1));
        self.cursor.col = col.saturating_sub(1).min(self.cols.saturating_sub(1));
    }

    /// Cursor column absolute (1-indexed)
    pub fn cursor_col_absolute(&mut self, col: u16) {
        self.cursor.col = col.saturating_sub(1).min(self.cols.saturating_sub(1));
    }

    /// Cursor row absolute (1-indexed)
    pub fn cursor_row_absolute(&mut self, row: u16) {
        self.cursor.row = row.saturating_sub(1).min(self.rows.saturating_sub(1));
    }

    /// Erase in display
    pub fn erase_in_display(&mut self, mode: u16) {
        let cursor_row = self.cursor.row as usize;
        match mode {
            0 => {
                // From cursor to end
                self.erase_in_line(0);
                for r in (cursor_row + 1)..self.rows as usize {
                    self.clear_line(r);
                }
            }
            1 => {
                // From start to cursor
                for r in 0..cursor_row {
                    self.clear_line(r);
                }
                self.erase_in_line(1);
            }
            2 | 3 => {
                // Entire screen
                for r in 0..self.rows as usize {
                    self.clear_line(r);
                }
            }
            _ => {}
        }
    }

    /// Erase in line
    pub fn erase_in_line(&mut self, mode: u16) {
        let row = self.cursor.row as usize;
        let col = (self.cursor.col as usize).min(self.cols.saturating_sub(1) as usize);
        if row >= self.grid.len() {
            return;
        }

        let attrs = self.current_attrs.clone();
        match mode {
            0 => {
                for cell in &mut self.grid[row][col..] {
                    cell.clear(&attrs);
                }
            }
            1 => {
                for cell in &mut self.grid[row][..=col] {
                    cell.clear(&attrs);
                }
            }
            2 => {
                for cell in &mut self.grid[row] {
                    cell.clear(&attrs);
                }
            }
            _ => {}
        }
        self.mark_dirty(row);
    }

    fn clear_line(&mut self, row: usize) {
        if let Some(line) = self.grid.get_mut(row) {
            let attrs = self.current_attrs.clone();
            for cell in line {
                cell.clear(&attrs);
            }
            self.dirty_lines.insert(row);
        }
    }

    /// Insert blank lines at the cursor row
    pub fn insert_lines(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        for _ in 0..n {
            if row < self.grid.len() {
                self.grid.insert(row, blank_row(self.cols));
                self.grid.truncate(self.rows as usize);
            }
        }
        self.mark_all_dirty();
    }

    /// Delete lines at the cursor row
    pub fn delete_lines(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        for _ in 0..n {
            if row < self.grid.len() {
                self.grid.remove(row);
                self.grid.push(blank_row(self.cols));
            }
        }
        self.mark_all_dirty();
    }

    /// Insert blank characters at the cursor, shifting the rest right
    pub fn insert_chars(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        for _ in 0..n {
            if col < self.grid[row].len() {
                self.grid[row].pop();
                self.grid[row].insert(col, Cell::default());
            }
        }
        self.mark_dirty(row);
    }

    /// Delete characters at the cursor, shifting the rest left
    pub fn delete_chars(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        for _ in 0..n {
            if col < self.grid[row].len() {
                self.grid[row].remove(col);
                self.grid[row].push(Cell::default());
            }
        }
        self.mark_dirty(row);
    }

    /// Erase characters at the cursor without shifting
    pub fn erase_chars(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        let attrs = self.current_attrs.clone();
        for i in 0..n as usize {
            if let Some(cell) = self.grid[row].get_mut(col + i) {
                cell.clear(&attrs);
            }
        }
        self.mark_dirty(row);
    }

    /// Set scroll region (1-indexed, inclusive)
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let top = top.saturating_sub(1).min(self.rows.saturating_sub(1));
        let bottom = bottom.saturating_sub(1).min(self.rows.saturating_sub(1));
        if top < bottom {
            self.scroll_region = (top, bottom);
        }
    }

    /// Save cursor position and attributes
    pub fn save_cursor(&mut self) {
        self.cursor.saved = Some(SavedCursor {
            col: self.cursor.col,
            row: self.cursor.row,
            attrs: self.current_attrs.clone(),
        });
    }

    /// Restore cursor position and attributes
    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.cursor.saved.clone() {
            self.cursor.col = saved.col.min(self.cols.saturating_sub(1));
            self.cursor.row = saved.row.min(self.rows.saturating_sub(1));
            self.current_attrs = saved.attrs;
        }
    }

    /// Set DEC private mode
    pub fn set_private_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            7 => self.auto_wrap = enable,
            25 => self.cursor.visible = enable,
            _ => {} // Ignore unknown modes
        }
    }

    /// Reverse index - cursor up, scroll if at the region top
    pub fn reverse_index(&mut self) {
        if self.cursor.row == self.scroll_region.0 {
            self.scroll_down(1);
        } else {
            self.cursor_up(1);
        }
    }

    /// Index - cursor down, scroll if at the region bottom
    pub fn index(&mut self) {
        self.linefeed();
    }
}

fn blank_row(cols: u16) -> Vec<Cell> {
    vec![Cell::default(); cols as usize]
}

/// A single cell
#[derive(Clone, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    pub fn clear(&mut self, attrs: &CellAttrs) {
        self.ch = ' ';
        self.attrs = attrs.clone();
    }
}

/// Cell attributes
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

/// Color definition
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

bitflags! {
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct AttrFlags: u8 {
        const BOLD      = 0b0000_0001;
        const DIM       = 0b0000_0010;
        const UNDERLINE = 0b0000_0100;
        const BLINK     = 0b0000_1000;
        const REVERSE   = 0b0001_0000;
    }
}

/// Cursor state
#[derive(Clone)]
pub struct CursorState {
    pub col: u16,
    pub row: u16,
    pub visible: bool,
    pub saved: Option<SavedCursor>,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            visible: true,
            saved: None,
        }
    }
}

/// Saved cursor state
#[derive(Clone)]
pub struct SavedCursor {
    pub col: u16,
    pub row: u16,
    pub attrs: CellAttrs,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(state: &TerminalState, row: usize) -> String {
        state.line(row).iter().map(|c| c.ch).collect()
    }

    #[test]
    fn test_put_char_advances_and_marks_dirty() {
        let mut state = TerminalState::new(4, 2);
        state.clear_dirty();

        state.put_char('h');
        state.put_char('i');

        assert_eq!(text(&state, 0), "hi  ");
        assert_eq!(state.cursor.col, 2);
        assert!(state.is_line_dirty(0));
        assert!(!state.is_line_dirty(1));
    }

    #[test]
    fn test_wrap_at_last_column() {
        let mut state = TerminalState::new(2, 2);
        state.put_char('a');
        state.put_char('b');
        // Cursor is now past the edge; the next char wraps
        assert_eq!(state.cursor.col, 2);
        state.put_char('c');

        assert_eq!(text(&state, 0), "ab");
        assert_eq!(text(&state, 1), "c ");
        assert_eq!((state.cursor.row, state.cursor.col), (1, 1));
    }

    #[test]
    fn test_linefeed_scrolls_at_bottom() {
        let mut state = TerminalState::new(2, 2);
        state.put_char('a');
        state.cursor_position(2, 1);
        state.put_char('b');
        state.clear_dirty();

        state.linefeed();

        assert_eq!(text(&state, 0), "b ");
        assert_eq!(text(&state, 1), "  ");
        assert!(state.has_dirty());
        assert!(state.is_line_dirty(0) && state.is_line_dirty(1));
    }

    #[test]
    fn test_scroll_region_bounds_scrolling() {
        let mut state = TerminalState::new(1, 4);
        for row in 0..4 {
            state.cursor_position(row + 1, 1);
            state.put_char((b'0' + row as u8) as char);
        }
        state.set_scroll_region(2, 3);
        state.cursor_position(3, 1);

        state.linefeed();

        // Only rows 1-2 scroll; 0 and 3 stay put
        assert_eq!(text(&state, 0), "0");
        assert_eq!(text(&state, 1), "2");
        assert_eq!(text(&state, 2), " ");
        assert_eq!(text(&state, 3), "3");
    }

    #[test]
    fn test_erase_in_line_from_cursor() {
        let mut state = TerminalState::new(4, 1);
        for ch in "abcd".chars() {
            state.put_char(ch);
        }
        state.cursor_position(1, 3);

        state.erase_in_line(0);
        assert_eq!(text(&state, 0), "ab  ");

        state.erase_in_line(1);
        assert_eq!(text(&state, 0), "    ");
    }

    #[test]
    fn test_erase_in_display_clears_everything() {
        let mut state = TerminalState::new(2, 2);
        state.put_char('x');
        state.cursor_position(2, 1);
        state.put_char('y');

        state.erase_in_display(2);

        assert_eq!(text(&state, 0), "  ");
        assert_eq!(text(&state, 1), "  ");
    }

    #[test]
    fn test_cursor_position_clamps() {
        let mut state = TerminalState::new(10, 5);
        state.cursor_position(99, 99);
        assert_eq!((state.cursor.row, state.cursor.col), (4, 9));
    }

    #[test]
    fn test_save_restore_cursor() {
        let mut state = TerminalState::new(10, 5);
        state.cursor_position(3, 4);
        state.current_attrs.flags |= AttrFlags::REVERSE;
        state.save_cursor();

        state.cursor_position(1, 1);
        state.current_attrs.reset();
        state.restore_cursor();

        assert_eq!((state.cursor.row, state.cursor.col), (2, 3));
        assert!(state.current_attrs.flags.contains(AttrFlags::REVERSE));
    }

    #[test]
    fn test_delete_and_insert_chars() {
        let mut state = TerminalState::new(4, 1);
        for ch in "abcd".chars() {
            state.put_char(ch);
        }
        state.cursor_position(1, 2);

        state.delete_chars(1);
        assert_eq!(text(&state, 0), "acd ");

        state.insert_chars(2);
        assert_eq!(text(&state, 0), "a  c");
    }

    #[test]
    fn test_private_mode_toggles() {
        let mut state = TerminalState::new(2, 2);
        state.set_private_mode(25, false);
        assert!(!state.cursor.visible);
        state.set_private_mode(7, false);
        assert!(!state.auto_wrap);
    }
}

//! VT sequence parser
//!
//! Parses ANSI/VT escape sequences and updates terminal state. The parser
//! itself never touches the outside world; anything that must escape the
//! grid (bell, answerback replies) is surfaced as a [`Response`].

use super::state::{AttrFlags, Color, TerminalState};

/// Out-of-band result of parsing a byte
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Audible bell (BEL)
    Bell,
    /// Cursor position report: ESC [ row ; col R
    CursorPosition(u16, u16),
    /// Operating status report
    Status,
    /// Device attributes response
    DeviceAttributes,
    /// Secondary device attributes response
    SecondaryDeviceAttributes,
}

impl Response {
    /// Bytes to write back to the PTY master, if this response carries any
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Response::Bell => None,
            Response::CursorPosition(row, col) => {
                Some(format!("\x1b[{};{}R", row, col).into_bytes())
            }
            Response::Status => Some(b"\x1b[0n".to_vec()),
            // VT220-style identification
            Response::DeviceAttributes => Some(b"\x1b[?62;c".to_vec()),
            Response::SecondaryDeviceAttributes => Some(b"\x1b[>1;10;0c".to_vec()),
        }
    }
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
    /// ESC seen inside an OSC string, waiting for the closing backslash
    EscapeInOsc,
}

/// Parser state machine
pub struct VtParser {
    state: ParserState,
    params: Vec<u16>,
    intermediates: Vec<u8>,
    current_param: Option<u16>,
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
        }
    }

    /// Whether the parser is between sequences
    pub fn in_ground(&self) -> bool {
        self.state == ParserState::Ground
    }

    /// Feed a single byte to the parser
    pub fn feed(&mut self, byte: u8, state: &mut TerminalState) -> Option<Response> {
        // C0 controls act from any state except inside OSC strings
        if byte < 0x20
            && self.state != ParserState::OscString
            && self.state != ParserState::EscapeInOsc
        {
            match byte {
                0x1B => self.enter_escape(),
                0x07 => return Some(Response::Bell),
                0x08 => state.backspace(),
                0x09 => state.horizontal_tab(),
                0x0A | 0x0B | 0x0C => state.linefeed(),
                0x0D => state.carriage_return(),
                _ => {}
            }
            return None;
        }

        match self.state {
            ParserState::Ground => {
                if (0x20..0x7F).contains(&byte) {
                    state.put_char(byte as char);
                }
                None
            }
            ParserState::Escape => self.escape(byte, state),
            ParserState::EscapeIntermediate => self.escape_intermediate(byte),
            ParserState::CsiEntry | ParserState::CsiParam => self.csi(byte, state),
            ParserState::CsiIntermediate => self.csi_intermediate(byte, state),
            ParserState::OscString => self.osc_string(byte),
            ParserState::EscapeInOsc => self.escape_in_osc(byte, state),
        }
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
    }

    fn escape(&mut self, byte: u8, state: &mut TerminalState) -> Option<Response> {
        self.state = ParserState::Ground;
        match byte {
            b'[' => self.state = ParserState::CsiEntry,
            b']' => self.state = ParserState::OscString,
            // DECSC / DECRC
            b'7' => state.save_cursor(),
            b'8' => state.restore_cursor(),
            // IND
            b'D' => state.index(),
            // NEL
            b'E' => {
                state.carriage_return();
                state.linefeed();
            }
            // RI
            b'M' => state.reverse_index(),
            // RIS - full reset
            b'c' => *state = TerminalState::new(state.cols, state.rows),
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
            }
            _ => {}
        }
        None
    }

    fn escape_intermediate(&mut self, byte: u8) -> Option<Response> {
        if (0x20..=0x2F).contains(&byte) {
            self.intermediates.push(byte);
        } else {
            // Final byte; charset selections and the like are ignored
            self.state = ParserState::Ground;
        }
        None
    }

    /// CSI entry and parameter accumulation
    fn csi(&mut self, byte: u8, state: &mut TerminalState) -> Option<Response> {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
                self.state = ParserState::CsiParam;
            }
            b';' | b':' => {
                self.params.push(self.current_param.take().unwrap_or(0));
                self.state = ParserState::CsiParam;
            }
            b'?' | b'>' | b'!' | b'=' if self.state == ParserState::CsiEntry => {
                self.intermediates.push(byte);
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
                return self.execute_csi(byte, state);
            }
            _ => self.state = ParserState::Ground,
        }
        None
    }

    fn csi_intermediate(&mut self, byte: u8, state: &mut TerminalState) -> Option<Response> {
        match byte {
            0x20..=0x2F => self.intermediates.push(byte),
            0x40..=0x7E => return self.execute_csi(byte, state),
            _ => self.state = ParserState::Ground,
        }
        None
    }

    fn osc_string(&mut self, byte: u8) -> Option<Response> {
        // OSC payloads (titles etc.) are consumed and ignored
        match byte {
            0x07 | 0x9C => self.state = ParserState::Ground,
            0x1B => self.state = ParserState::EscapeInOsc,
            _ => {}
        }
        None
    }

    fn escape_in_osc(&mut self, byte: u8, state: &mut TerminalState) -> Option<Response> {
        if byte == b'\\' {
            // ST (ESC \) closes the string
            self.state = ParserState::Ground;
            None
        } else {
            // Not ST; treat as the start of a new escape sequence
            self.enter_escape();
            self.escape(byte, state)
        }
    }

    /// Numeric parameter `i`, or `default` when absent
    fn arg(&self, i: usize, default: u16) -> u16 {
        self.params.get(i).copied().unwrap_or(default)
    }

    /// First parameter as a repeat count (at least 1)
    fn count(&self) -> u16 {
        self.arg(0, 1).max(1)
    }

    fn execute_csi(&mut self, final_byte: u8, state: &mut TerminalState) -> Option<Response> {
        self.state = ParserState::Ground;

        if self.intermediates.contains(&b'?') {
            // DEC private modes
            if final_byte == b'h' || final_byte == b'l' {
                for &mode in &self.params {
                    state.set_private_mode(mode, final_byte == b'h');
                }
            }
            return None;
        }
        if self.intermediates.contains(&b'>') {
            return (final_byte == b'c').then(|| Response::SecondaryDeviceAttributes);
        }

        match final_byte {
            b'A' => state.cursor_up(self.count()),
            b'B' => state.cursor_down(self.count()),
            b'C' => state.cursor_forward(self.count()),
            b'D' => state.cursor_backward(self.count()),
            // CNL / CPL
            b'E' => {
                state.cursor_down(self.count());
                state.carriage_return();
            }
            b'F' => {
                state.cursor_up(self.count());
                state.carriage_return();
            }
            // CHA / CUP / VPA
            b'G' => state.cursor_col_absolute(self.arg(0, 1)),
            b'H' | b'f' => state.cursor_position(self.arg(0, 1), self.arg(1, 1)),
            b'd' => state.cursor_row_absolute(self.arg(0, 1)),
            // ED / EL
            b'J' => state.erase_in_display(self.arg(0, 0)),
            b'K' => state.erase_in_line(self.arg(0, 0)),
            // IL / DL
            b'L' => state.insert_lines(self.count()),
            b'M' => state.delete_lines(self.count()),
            // ICH / DCH / ECH
            b'@' => state.insert_chars(self.count()),
            b'P' => state.delete_chars(self.count()),
            b'X' => state.erase_chars(self.count()),
            // SU / SD
            b'S' => state.scroll_up(self.count()),
            b'T' => state.scroll_down(self.count()),
            // DECSTBM homes the cursor
            b'r' => {
                let bottom = self.arg(1, state.rows);
                state.set_scroll_region(self.arg(0, 1), bottom);
                state.cursor_position(1, 1);
            }
            b'm' => self.execute_sgr(state),
            b's' => state.save_cursor(),
            b'u' => state.restore_cursor(),
            b'n' => return self.device_status(state),
            b'c' => return Some(Response::DeviceAttributes),
            // ANSI modes; none of them affect this terminal
            b'h' | b'l' => {}
            _ => {
                tracing::debug!(
                    "Unknown CSI: intermediates={:?}, params={:?}, final={:?}",
                    self.intermediates,
                    self.params,
                    final_byte as char
                );
            }
        }
        None
    }

    fn device_status(&self, state: &TerminalState) -> Option<Response> {
        match self.arg(0, 0) {
            5 => Some(Response::Status),
            6 => Some(Response::CursorPosition(
                state.cursor.row + 1,
                state.cursor.col + 1,
            )),
            _ => None,
        }
    }

    fn execute_sgr(&self, state: &mut TerminalState) {
        if self.params.is_empty() {
            state.current_attrs.reset();
            return;
        }

        let mut i = 0;
        while i < self.params.len() {
            let attrs = &mut state.current_attrs;
            match self.params[i] {
                0 => attrs.reset(),
                1 => attrs.flags |= AttrFlags::BOLD,
                2 => attrs.flags |= AttrFlags::DIM,
                4 => attrs.flags |= AttrFlags::UNDERLINE,
                5 => attrs.flags |= AttrFlags::BLINK,
                7 => attrs.flags |= AttrFlags::REVERSE,

                22 => attrs.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
                24 => attrs.flags &= !AttrFlags::UNDERLINE,
                25 => attrs.flags &= !AttrFlags::BLINK,
                27 => attrs.flags &= !AttrFlags::REVERSE,

                n @ 30..=37 => attrs.fg = Color::Indexed((n - 30) as u8),
                39 => attrs.fg = Color::Default,
                n @ 40..=47 => attrs.bg = Color::Indexed((n - 40) as u8),
                49 => attrs.bg = Color::Default,

                // Bright variants
                n @ 90..=97 => attrs.fg = Color::Indexed((n - 90 + 8) as u8),
                n @ 100..=107 => attrs.bg = Color::Indexed((n - 100 + 8) as u8),

                // Extended colors: 38/48 ; 5 ; n  or  38/48 ; 2 ; r ; g ; b
                n @ (38 | 48) => {
                    let (color, consumed) = self.extended_color(i + 1);
                    if let Some(color) = color {
                        if n == 38 {
                            attrs.fg = color;
                        } else {
                            attrs.bg = color;
                        }
                    }
                    i += consumed;
                }

                _ => {}
            }
            i += 1;
        }
    }

    /// Decode the parameters after a 38/48 introducer, returning the color
    /// (if well-formed) and how many parameters were consumed
    fn extended_color(&self, at: usize) -> (Option<Color>, usize) {
        match self.params.get(at) {
            Some(5) => (
                self.params.get(at + 1).map(|&n| Color::Indexed(n as u8)),
                2,
            ),
            Some(2) => {
                let channel = |k| self.params.get(at + k).copied().unwrap_or(0) as u8;
                (Some(Color::Rgb(channel(1), channel(2), channel(3))), 4)
            }
            Some(_) => (None, 1),
            None => (None, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut VtParser, state: &mut TerminalState, bytes: &[u8]) -> Vec<Response> {
        bytes
            .iter()
            .filter_map(|&b| parser.feed(b, state))
            .collect()
    }

    #[test]
    fn test_cursor_movement() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut state, b"\x1b[5;10H");

        assert_eq!(state.cursor.row, 4);
        assert_eq!(state.cursor.col, 9);
    }

    #[test]
    fn test_sgr_colors() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut state, b"\x1b[31;44m");
        assert_eq!(state.current_attrs.fg, Color::Indexed(1));
        assert_eq!(state.current_attrs.bg, Color::Indexed(4));

        feed(&mut parser, &mut state, b"\x1b[0m");
        assert_eq!(state.current_attrs.fg, Color::Default);
        assert_eq!(state.current_attrs.bg, Color::Default);
    }

    #[test]
    fn test_sgr_reverse_and_reset() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut state, b"\x1b[7m");
        assert!(state.current_attrs.flags.contains(AttrFlags::REVERSE));

        feed(&mut parser, &mut state, b"\x1b[27m");
        assert!(!state.current_attrs.flags.contains(AttrFlags::REVERSE));
    }

    #[test]
    fn test_sgr_extended_colors() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut state, b"\x1b[38;5;12m");
        assert_eq!(state.current_attrs.fg, Color::Indexed(12));

        feed(&mut parser, &mut state, b"\x1b[48;2;1;2;3m");
        assert_eq!(state.current_attrs.bg, Color::Rgb(1, 2, 3));
    }

    #[test]
    fn test_sgr_extended_color_then_attribute() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        // The color parameters must not be misread as SGR codes
        feed(&mut parser, &mut state, b"\x1b[38;5;1;7m");
        assert_eq!(state.current_attrs.fg, Color::Indexed(1));
        assert!(state.current_attrs.flags.contains(AttrFlags::REVERSE));
    }

    #[test]
    fn test_bell_is_surfaced() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        let responses = feed(&mut parser, &mut state, b"\x07");
        assert_eq!(responses, vec![Response::Bell]);
        assert!(Response::Bell.to_bytes().is_none());
    }

    #[test]
    fn test_dsr_answerback() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut state, b"\x1b[3;7H");
        let responses = feed(&mut parser, &mut state, b"\x1b[6n");

        assert_eq!(responses, vec![Response::CursorPosition(3, 7)]);
        assert_eq!(responses[0].to_bytes().unwrap(), b"\x1b[3;7R");
    }

    #[test]
    fn test_device_attributes() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        let responses = feed(&mut parser, &mut state, b"\x1b[c\x1b[>c");
        assert_eq!(
            responses,
            vec![
                Response::DeviceAttributes,
                Response::SecondaryDeviceAttributes
            ]
        );
    }

    #[test]
    fn test_cursor_visibility_mode() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut state, b"\x1b[?25l");
        assert!(!state.cursor.visible);
        feed(&mut parser, &mut state, b"\x1b[?25h");
        assert!(state.cursor.visible);
    }

    #[test]
    fn test_osc_is_consumed() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut state, b"\x1b]0;some title\x07A");

        // Only the trailing 'A' lands in the grid
        assert_eq!(state.line(0)[0].ch, 'A');
        assert_eq!(state.line(0)[1].ch, ' ');
    }

    #[test]
    fn test_osc_terminated_by_st() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut state, b"\x1b]2;title\x1b\\B");

        assert_eq!(state.line(0)[0].ch, 'B');
    }

    #[test]
    fn test_unknown_csi_returns_to_ground() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        feed(&mut parser, &mut state, b"\x1b[999zB");
        assert!(parser.in_ground());
        assert_eq!(state.line(0)[0].ch, 'B');
    }
}

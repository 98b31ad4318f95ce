//! Session management
//!
//! Couples the VT parser and terminal state and translates raw child
//! output into the event stream the renderer consumes. Events fire on the
//! caller's stack during [`Session::feed_bytes`]; bell and answerback
//! surface immediately, grid and cursor changes are reported once per fed
//! chunk (screen update first, then cursor motion, then visibility).

use super::term::{EventSink, Response, TermEvent, TerminalState, VtParser};

/// A terminal session: interpreter state plus event bookkeeping
pub struct Session {
    state: TerminalState,
    parser: VtParser,
    /// Cursor position as last reported to the sink (row, col)
    last_cursor: (u16, u16),
    /// Cursor visibility as last reported to the sink
    last_visible: bool,
}

impl Session {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            state: TerminalState::new(cols, rows),
            parser: VtParser::new(),
            last_cursor: (0, 0),
            last_visible: true,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> &TerminalState {
        &self.state
    }

    /// Feed raw bytes from the child into the terminal
    pub fn feed_bytes(&mut self, bytes: &[u8], sink: &mut dyn EventSink) {
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];

            // Escape sequences and ASCII go through the parser byte-wise;
            // UTF-8 sequences are decoded only between sequences
            if b < 0x80 || !self.parser.in_ground() {
                if let Some(response) = self.parser.feed(b, &mut self.state) {
                    self.dispatch(response, sink);
                }
                i += 1;
                continue;
            }

            let seq_len = if b & 0xE0 == 0xC0 {
                2
            } else if b & 0xF0 == 0xE0 {
                3
            } else if b & 0xF8 == 0xF0 {
                4
            } else {
                1
            };

            if i + seq_len <= bytes.len() {
                if let Ok(s) = std::str::from_utf8(&bytes[i..i + seq_len]) {
                    for ch in s.chars() {
                        self.state.put_char(ch);
                    }
                    i += seq_len;
                    continue;
                }
            }

            // Invalid or incomplete sequence, skip the byte
            i += 1;
        }

        self.flush_events(sink);
    }

    fn dispatch(&mut self, response: Response, sink: &mut dyn EventSink) {
        match response {
            Response::Bell => sink.on_event(TermEvent::Bell, &self.state),
            reply => {
                if let Some(bytes) = reply.to_bytes() {
                    sink.on_event(TermEvent::Answerback(&bytes), &self.state);
                }
            }
        }
    }

    /// Report accumulated grid and cursor changes for the fed chunk
    fn flush_events(&mut self, sink: &mut dyn EventSink) {
        if self.state.has_dirty() {
            sink.on_event(TermEvent::ScreenUpdate, &self.state);
            self.state.clear_dirty();
        }

        let cursor = (self.state.cursor.row, self.state.cursor.col);
        if cursor != self.last_cursor {
            self.last_cursor = cursor;
            sink.on_event(
                TermEvent::CursorMoved {
                    row: cursor.0,
                    col: cursor.1,
                },
                &self.state,
            );
        }

        if self.state.cursor.visible != self.last_visible {
            self.last_visible = self.state.cursor.visible;
            sink.on_event(TermEvent::CursorVisibility(self.last_visible), &self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Owned copy of a delivered event
    #[derive(Debug, PartialEq)]
    enum Recorded {
        Bell,
        Update(Vec<usize>),
        Moved(u16, u16),
        Answer(Vec<u8>),
        Visibility(bool),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<Recorded>,
    }

    impl EventSink for RecordingSink {
        fn on_event(&mut self, event: TermEvent<'_>, term: &TerminalState) {
            self.events.push(match event {
                TermEvent::Bell => Recorded::Bell,
                TermEvent::ScreenUpdate => Recorded::Update(
                    (0..term.rows as usize)
                        .filter(|&y| term.is_line_dirty(y))
                        .collect(),
                ),
                TermEvent::CursorMoved { row, col } => Recorded::Moved(row, col),
                TermEvent::Answerback(bytes) => Recorded::Answer(bytes.to_vec()),
                TermEvent::CursorVisibility(v) => Recorded::Visibility(v),
            });
        }
    }

    /// Drain the initial full-redraw update a fresh session reports
    fn settled(cols: u16, rows: u16) -> (Session, RecordingSink) {
        let mut session = Session::new(cols, rows);
        let mut sink = RecordingSink::default();
        session.feed_bytes(b"", &mut sink);
        (session, RecordingSink::default())
    }

    #[test]
    fn test_print_reports_update_then_motion() {
        let (mut session, mut sink) = settled(80, 24);

        session.feed_bytes(b"A", &mut sink);

        assert_eq!(
            sink.events,
            vec![Recorded::Update(vec![0]), Recorded::Moved(0, 1)]
        );
        assert_eq!(session.state().line(0)[0].ch, 'A');
    }

    #[test]
    fn test_cursor_motion_alone_does_not_redeliver_update() {
        let (mut session, mut sink) = settled(80, 24);
        session.feed_bytes(b"A", &mut sink);
        sink.events.clear();

        session.feed_bytes(b"\x1b[C", &mut sink);

        assert_eq!(sink.events, vec![Recorded::Moved(0, 2)]);
    }

    #[test]
    fn test_single_chunk_orders_update_before_motion() {
        let (mut session, mut sink) = settled(80, 24);

        session.feed_bytes(b"A\x1b[C", &mut sink);

        assert_eq!(
            sink.events,
            vec![Recorded::Update(vec![0]), Recorded::Moved(0, 2)]
        );
    }

    #[test]
    fn test_bell_is_immediate() {
        let (mut session, mut sink) = settled(80, 24);

        session.feed_bytes(b"\x07", &mut sink);

        assert_eq!(sink.events, vec![Recorded::Bell]);
    }

    #[test]
    fn test_answerback_carries_reply_bytes() {
        let (mut session, mut sink) = settled(80, 24);

        session.feed_bytes(b"\x1b[6n", &mut sink);

        assert_eq!(sink.events, vec![Recorded::Answer(b"\x1b[1;1R".to_vec())]);
    }

    #[test]
    fn test_visibility_toggle_is_reported_once() {
        let (mut session, mut sink) = settled(80, 24);

        session.feed_bytes(b"\x1b[?25l", &mut sink);
        session.feed_bytes(b"\x1b[?25l", &mut sink);

        assert_eq!(sink.events, vec![Recorded::Visibility(false)]);
    }

    #[test]
    fn test_utf8_decoding() {
        let (mut session, mut sink) = settled(80, 24);

        session.feed_bytes("héllo".as_bytes(), &mut sink);

        let text: String = session.state().line(0)[..5].iter().map(|c| c.ch).collect();
        assert_eq!(text, "héllo");
        assert_eq!(
            sink.events,
            vec![Recorded::Update(vec![0]), Recorded::Moved(0, 5)]
        );
    }

    #[test]
    fn test_fresh_session_reports_full_redraw() {
        let mut session = Session::new(4, 2);
        let mut sink = RecordingSink::default();

        session.feed_bytes(b"", &mut sink);

        assert_eq!(sink.events, vec![Recorded::Update(vec![0, 1])]);
    }
}

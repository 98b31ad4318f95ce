//! VT100/ANSI terminal emulation.
//!
//! This module holds the terminal interpreter and its boundary with the
//! renderer:
//!
//! - **state**: cell grid, cursor, attributes, dirty-line bookkeeping
//! - **parser**: byte-at-a-time escape sequence state machine
//! - [`TermEvent`] / [`EventSink`]: the synchronous event interface the
//!   interpreter drives the renderer through
//!
//! Events are delivered on the caller's stack while bytes are being fed;
//! there is no queue and no asynchronous dispatch.

pub mod parser;
pub mod state;

pub use parser::{Response, VtParser};
pub use state::{AttrFlags, Cell, CellAttrs, Color, CursorState, TerminalState};

/// A terminal state change the renderer must react to
#[derive(Debug, PartialEq)]
pub enum TermEvent<'a> {
    /// BEL received
    Bell,
    /// One or more grid lines are dirty and need repainting. Dirty flags
    /// are cleared once the sink returns; the event is not redelivered.
    ScreenUpdate,
    /// The cursor cell changed
    CursorMoved { row: u16, col: u16 },
    /// Bytes the terminal must send back to the child verbatim
    Answerback(&'a [u8]),
    /// DECTCEM show/hide
    CursorVisibility(bool),
}

/// Receiver for terminal events, invoked synchronously with a snapshot of
/// the grid the event refers to
pub trait EventSink {
    fn on_event(&mut self, event: TermEvent<'_>, term: &TerminalState);
}

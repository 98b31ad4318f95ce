//! Core terminal emulation components.
//!
//! This module contains the low-level terminal emulation logic:
//!
//! - **pty**: Unix pseudo-terminal wrapper for spawning the child shell
//! - **term**: VT100/ANSI terminal state, escape sequence parser and the
//!   event boundary the renderer consumes
//! - **session**: feed glue combining parser + state into an event stream
//!
//! # Architecture
//!
//! ```text
//! Pty (child shell I/O)
//!  └─> Session::feed_bytes
//!       ├── VtParser (escape sequences)
//!       ├── TerminalState (cell grid + cursor + dirty lines)
//!       └── EventSink callbacks (implemented by the renderer)
//! ```

pub mod pty;
pub mod session;
pub mod term;

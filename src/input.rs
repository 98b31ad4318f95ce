//! Keyboard input bridge
//!
//! Switches the real controlling terminal into raw mode and copies
//! keystroke bytes into the PTY master from its own thread. The bridge
//! shares nothing with the render path except the PTY descriptor; it ends
//! when stdin reaches end-of-stream or errors, and has no cancellation
//! handle. The terminal's previous mode is not restored on exit.

use std::io::{self, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::core::pty::Pty;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to query terminal attributes: {0}")]
    GetAttrs(#[source] io::Error),

    #[error("Failed to set terminal attributes: {0}")]
    SetAttrs(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, InputError>;

/// Clear the flags that stand between raw keystrokes and the child:
/// CR -> NL translation, echo, canonical input and signal keys
fn raw_termios(mut termios: libc::termios) -> libc::termios {
    termios.c_iflag &= !libc::ICRNL;
    termios.c_lflag &= !(libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios
}

/// Switch the controlling terminal into raw mode
fn enable_raw_mode() -> Result<()> {
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &mut termios) } != 0 {
        return Err(InputError::GetAttrs(io::Error::last_os_error()));
    }

    let raw = raw_termios(termios);
    if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &raw) } != 0 {
        return Err(InputError::SetAttrs(io::Error::last_os_error()));
    }
    Ok(())
}

/// Put stdin into raw mode and start the copy loop feeding the PTY master.
///
/// Raw-mode failures are fatal setup errors; once the thread runs, EOF and
/// I/O errors on either side simply end the bridge.
pub fn bridge(pty: Arc<Pty>) -> Result<JoinHandle<()>> {
    enable_raw_mode()?;

    let handle = thread::spawn(move || {
        let mut buf = [0u8; 1024];
        loop {
            match io::stdin().read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if pty.write_all(&buf[..n]).is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("input bridge ended");
    });

    Ok(handle)
}

//! Unix pseudo-terminal wrapper
//!
//! This module provides a safe wrapper around the PTY pair: it allocates
//! master and subordinate ends sized to the terminal grid, forks the child
//! shell with the subordinate as its controlling terminal, and owns the
//! master descriptor for the lifetime of the session.

use std::ffi::CString;
use std::io;
use std::ptr;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to allocate pseudo-terminal: {0}")]
    Allocate(#[source] io::Error),

    #[error("Failed to fork child process: {0}")]
    Fork(#[source] io::Error),

    #[error("Command contains an interior NUL byte")]
    BadCommand,

    #[error("Failed to read from PTY: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// Master side of a spawned pseudo-terminal session
#[derive(Debug)]
pub struct Pty {
    master: libc::c_int,
    /// Child pid; the session does not reap it, end of session is
    /// observed as end-of-stream on the master
    #[allow(dead_code)]
    child: libc::pid_t,
    cols: u16,
    rows: u16,
}

impl Pty {
    /// Allocate a PTY pair sized to the grid and spawn `command` on the
    /// subordinate end.
    ///
    /// The child gets the subordinate as controlling terminal on
    /// stdin/stdout/stderr and `TERM=ansi` in its environment; any
    /// child-side setup failure exits the child immediately. Must be
    /// called before other threads exist (it forks).
    pub fn spawn(command: &str, args: &[String], cols: u16, rows: u16) -> Result<Self> {
        let cmd = CString::new(command).map_err(|_| PtyError::BadCommand)?;
        let mut argv_owned = vec![cmd.clone()];
        for arg in args {
            argv_owned.push(CString::new(arg.as_str()).map_err(|_| PtyError::BadCommand)?);
        }
        let mut argv: Vec<*const libc::c_char> = argv_owned.iter().map(|a| a.as_ptr()).collect();
        argv.push(ptr::null());

        const TERM_NAME: &[u8] = b"TERM\0";
        const TERM_VALUE: &[u8] = b"ansi\0";

        let ws = libc::winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        let mut master: libc::c_int = 0;
        let mut slave: libc::c_int = 0;
        if unsafe { libc::openpty(&mut master, &mut slave, ptr::null_mut(), ptr::null(), &ws) } != 0
        {
            return Err(PtyError::Allocate(io::Error::last_os_error()));
        }

        match unsafe { libc::fork() } {
            -1 => {
                let err = io::Error::last_os_error();
                unsafe {
                    libc::close(master);
                    libc::close(slave);
                }
                Err(PtyError::Fork(err))
            }
            0 => {
                // Child: wire the subordinate end up as the controlling
                // terminal, then become the shell. A child that fails any
                // of these steps must not keep running.
                unsafe {
                    libc::close(master);
                    if libc::setsid() < 0 {
                        libc::_exit(1);
                    }
                    if libc::ioctl(slave, libc::TIOCSCTTY, 0) != 0 {
                        libc::_exit(1);
                    }
                    if libc::dup2(slave, 0) < 0
                        || libc::dup2(slave, 1) < 0
                        || libc::dup2(slave, 2) < 0
                    {
                        libc::_exit(1);
                    }
                    if slave > 2 {
                        libc::close(slave);
                    }
                    libc::setenv(
                        TERM_NAME.as_ptr() as *const libc::c_char,
                        TERM_VALUE.as_ptr() as *const libc::c_char,
                        1,
                    );
                    libc::execvp(cmd.as_ptr(), argv.as_ptr());
                    libc::_exit(127)
                }
            }
            pid => {
                unsafe { libc::close(slave) };
                tracing::info!("spawned {} (pid {}) on a {}x{} pty", command, pid, cols, rows);
                Ok(Self {
                    master,
                    child: pid,
                    cols,
                    rows,
                })
            }
        }
    }

    /// Blocking read from the master (output of the child)
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let n = unsafe { libc::read(self.master, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            Err(PtyError::Read(io::Error::last_os_error()))
        } else {
            Ok(n as usize)
        }
    }

    /// Write bytes to the master (input to the child)
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let n = unsafe { libc::write(self.master, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n < 0 {
            Err(PtyError::Write(io::Error::last_os_error()))
        } else {
            Ok(n as usize)
        }
    }

    /// Write an entire buffer to the master
    pub fn write_all(&self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(PtyError::Write(io::Error::from(io::ErrorKind::WriteZero)));
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    #[allow(dead_code)]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    #[allow(dead_code)]
    pub fn rows(&self) -> u16 {
        self.rows
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.master);
        }
    }
}

/// `io::Write` adapter over a shared PTY, used for the answerback path
pub struct PtyWriter(pub Arc<Pty>);

impl io::Write for PtyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .write(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

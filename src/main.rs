//! fbterm - a minimal framebuffer terminal for Linux
//!
//! fbterm spawns a shell on a pseudo-terminal and paints its screen as
//! bitmap glyphs straight into the memory-mapped framebuffer. No display
//! server, one session, fixed geometry.
//!
//! # How it works
//!
//! ```text
//! stdin ──raw bytes──> PTY master ──> child shell
//! child shell ──output──> VT parser ──events──> renderer ──> /dev/fb0
//! ```
//!
//! The output loop blocks on the PTY master and drives the renderer
//! synchronously; a bridge thread copies raw keystrokes from the
//! controlling terminal into the PTY. The session ends when the child
//! exits.
//!
//! # Quick Start
//!
//! ```text
//! fbterm                         # /bin/sh with the configured font
//! fbterm -s /bin/bash -C 100     # bash on a 100-column grid
//! fbterm -f ter-116n.psf.gz      # a different console font
//! ```

mod config;
mod core;
mod input;
mod ui;

use std::env;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::core::pty::{Pty, PtyWriter};
use crate::core::session::Session;
use crate::ui::{Font, Framebuffer, Geometry, Renderer};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command-line overrides for the config file
#[derive(Default)]
struct CliArgs {
    shell: Option<String>,
    font: Option<std::path::PathBuf>,
    device: Option<std::path::PathBuf>,
    columns: Option<u16>,
    scheme: Option<String>,
}

fn print_version() {
    eprintln!("fbterm {}", VERSION);
}

fn print_help() {
    eprintln!("fbterm {} - a minimal framebuffer terminal for Linux", VERSION);
    eprintln!();
    eprintln!("Usage: fbterm [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <CMD>     Child shell (default: /bin/sh)");
    eprintln!("  -f, --font <PATH>     PSF2 console font, gzipped or plain");
    eprintln!("      --device <PATH>   Framebuffer device (default: /dev/fb0)");
    eprintln!("  -C, --columns <N>     Requested grid width in cells (default: 80)");
    eprintln!("      --scheme <NAME>   Color scheme: {}", config::ColorScheme::list().join(", "));
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Settings may also be placed in ~/.fbterm/config.toml;");
    eprintln!("command-line options take precedence.");
}

fn parse_args() -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-s" | "--shell" => {
                cli.shell = Some(args.next().ok_or("missing value for --shell")?);
            }
            "-f" | "--font" => {
                cli.font = Some(args.next().ok_or("missing value for --font")?.into());
            }
            "--device" => {
                cli.device = Some(args.next().ok_or("missing value for --device")?.into());
            }
            "-C" | "--columns" => {
                let value = args.next().ok_or("missing value for --columns")?;
                cli.columns = Some(
                    value
                        .parse()
                        .map_err(|_| format!("invalid column count: {}", value))?,
                );
            }
            "--scheme" => {
                cli.scheme = Some(args.next().ok_or("missing value for --scheme")?);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => return Err(format!("unknown option: {}", other)),
        }
    }

    Ok(cli)
}

/// Initialize logging into `~/.fbterm/fbterm.log`.
///
/// The controlling terminal is in raw mode and the framebuffer is the
/// display, so a file is the only place diagnostics can go during a
/// session.
fn init_logging() {
    let log_path = std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .map(|h| h.join(".fbterm").join("fbterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("fbterm.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("fbterm {} starting...", VERSION);

    // Command line overrides the config file
    let mut config = Config::load();
    if let Some(shell) = cli.shell {
        config.shell = shell;
    }
    if let Some(font) = cli.font {
        config.font = font;
    }
    if let Some(device) = cli.device {
        config.device = device;
    }
    if let Some(columns) = cli.columns {
        config.columns = columns;
    }
    if let Some(scheme) = cli.scheme {
        config.color_scheme = scheme;
    }

    run(config)
}

fn run(config: Config) -> anyhow::Result<()> {
    // The font decides the cell geometry; a bad font path must fail
    // before any framebuffer mapping exists
    let font = Font::load(&config.font)
        .with_context(|| format!("loading font {}", config.font.display()))?;
    let fb = Framebuffer::open(&config.device)
        .with_context(|| format!("opening framebuffer {}", config.device.display()))?;

    let geometry = Geometry::compute(fb.width(), fb.height(), &font, config.columns)
        .context("framebuffer is smaller than one glyph cell")?;
    info!(
        "grid {}x{} cells, origin ({}, {})",
        geometry.cols, geometry.rows, geometry.origin_x, geometry.origin_y
    );

    // Fork the child before the bridge thread exists
    let pty = Arc::new(Pty::spawn(
        &config.shell,
        &config.args,
        geometry.cols,
        geometry.rows,
    )?);

    let mut renderer = Renderer::new(
        fb,
        font,
        config.get_color_scheme(),
        geometry,
        PtyWriter(pty.clone()),
    );
    let mut session = Session::new(geometry.cols, geometry.rows);

    // Paint the empty grid before the first child bytes arrive
    session.feed_bytes(b"", &mut renderer);

    // No cancellation handle: the bridge lives until its stdin ends
    let _bridge = input::bridge(pty.clone())?;

    output_loop(&pty, &mut session, &mut renderer);
    info!("session ended");
    Ok(())
}

/// Read child output until end-of-stream and feed it to the terminal.
///
/// EOF and read errors both mean the session is over (Linux reports EIO
/// on the master once the child exits); neither is distinguished from a
/// clean exit.
fn output_loop<W: Write>(pty: &Pty, session: &mut Session, renderer: &mut Renderer<W>) {
    let mut buf = [0u8; 4096];
    loop {
        match pty.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => session.feed_bytes(&buf[..n], renderer),
        }
    }
}

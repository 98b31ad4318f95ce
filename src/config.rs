//! Configuration and color scheme management for fbterm.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.fbterm/config.toml`
//! - Built-in terminal palettes (default, gruvbox-dark, solarized-dark, nord)
//! - The pure color mapping from logical terminal colors to framebuffer pixels
//!
//! # Configuration File
//!
//! The configuration file is located at `~/.fbterm/config.toml`:
//!
//! ```toml
//! # Child shell and arguments (optional)
//! shell = "/bin/sh"
//! args = []
//!
//! # PSF2 console font, gzipped or plain
//! font = "/usr/share/kbd/consolefonts/default8x16.psfu.gz"
//!
//! # Framebuffer device
//! device = "/dev/fb0"
//!
//! # Requested grid width; clamped to what the framebuffer fits
//! columns = 80
//!
//! # Palette: default, gruvbox-dark, solarized-dark, nord
//! color_scheme = "gruvbox-dark"
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::term::Color as TermColor;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Child shell command
    pub shell: String,
    /// Arguments passed to the shell
    pub args: Vec<String>,
    /// PSF2 font path (gzip-compressed or plain)
    pub font: PathBuf,
    /// Framebuffer device path
    pub device: PathBuf,
    /// Requested grid width in cells
    pub columns: u16,
    /// Color scheme name
    pub color_scheme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            args: Vec::new(),
            font: PathBuf::from("/usr/share/kbd/consolefonts/default8x16.psfu.gz"),
            device: PathBuf::from("/dev/fb0"),
            columns: 80,
            color_scheme: "gruvbox-dark".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".fbterm").join("config.toml"))
    }

    /// Get the color scheme
    pub fn get_color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.color_scheme)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack into a 32-bit framebuffer pixel (0x00RRGGBB)
    pub const fn to_pixel(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

/// Color scheme definition: the eight ANSI colors plus default fg/bg
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorScheme {
    pub name: String,

    /// Indexed colors 0-7 (black, red, green, yellow, blue, magenta, cyan, white)
    pub palette: [Color; 8],

    pub foreground: Color,
    pub background: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    /// Resolve a logical terminal color to a framebuffer pixel.
    ///
    /// This is the only place color decisions are made: indexed colors 0-7
    /// come from the palette, the bright range 8-15 folds onto the base
    /// eight, higher indices and unset colors fall back to the default
    /// foreground or background, and truecolor passes straight through.
    pub fn pixel(&self, color: TermColor, is_fg: bool) -> u32 {
        match color {
            TermColor::Indexed(n @ 0..=7) => self.palette[n as usize].to_pixel(),
            TermColor::Indexed(n @ 8..=15) => self.palette[(n - 8) as usize].to_pixel(),
            TermColor::Rgb(r, g, b) => Color::new(r, g, b).to_pixel(),
            _ => {
                if is_fg {
                    self.foreground.to_pixel()
                } else {
                    self.background.to_pixel()
                }
            }
        }
    }

    /// Classic VGA console colors
    pub fn default_scheme() -> Self {
        Self {
            name: "default".to_string(),
            palette: [
                Color::new(0, 0, 0),
                Color::new(170, 0, 0),
                Color::new(0, 170, 0),
                Color::new(170, 85, 0),
                Color::new(0, 0, 170),
                Color::new(170, 0, 170),
                Color::new(0, 170, 170),
                Color::new(170, 170, 170),
            ],
            foreground: Color::new(170, 170, 170),
            background: Color::new(0, 0, 0),
        }
    }

    /// Gruvbox Dark scheme
    pub fn gruvbox_dark() -> Self {
        Self {
            name: "gruvbox-dark".to_string(),
            palette: [
                Color::new(29, 32, 33),
                Color::new(204, 36, 29),
                Color::new(152, 151, 26),
                Color::new(215, 153, 33),
                Color::new(69, 133, 136),
                Color::new(177, 98, 134),
                Color::new(104, 157, 106),
                Color::new(168, 153, 132),
            ],
            foreground: Color::new(235, 219, 178),
            background: Color::new(29, 32, 33),
        }
    }

    /// Solarized Dark scheme
    pub fn solarized_dark() -> Self {
        Self {
            name: "solarized-dark".to_string(),
            palette: [
                Color::new(7, 54, 66),
                Color::new(220, 50, 47),
                Color::new(133, 153, 0),
                Color::new(181, 137, 0),
                Color::new(38, 139, 210),
                Color::new(211, 54, 130),
                Color::new(42, 161, 152),
                Color::new(238, 232, 213),
            ],
            foreground: Color::new(131, 148, 150),
            background: Color::new(0, 43, 54),
        }
    }

    /// Nord scheme
    pub fn nord() -> Self {
        Self {
            name: "nord".to_string(),
            palette: [
                Color::new(59, 66, 82),
                Color::new(191, 97, 106),
                Color::new(163, 190, 140),
                Color::new(235, 203, 139),
                Color::new(129, 161, 193),
                Color::new(180, 142, 173),
                Color::new(136, 192, 208),
                Color::new(229, 233, 240),
            ],
            foreground: Color::new(216, 222, 233),
            background: Color::new(46, 52, 64),
        }
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "gruvbox-dark" | "gruvbox_dark" | "gruvbox" => Self::gruvbox_dark(),
            "solarized-dark" | "solarized_dark" => Self::solarized_dark(),
            "nord" => Self::nord(),
            _ => Self::default_scheme(),
        }
    }

    /// List available schemes
    pub fn list() -> Vec<&'static str> {
        vec!["default", "gruvbox-dark", "solarized-dark", "nord"]
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

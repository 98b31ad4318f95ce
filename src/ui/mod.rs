//! Framebuffer output path.
//!
//! Everything that turns terminal state into pixels:
//!
//! - **framebuffer**: the mmap'd fbdev surface
//! - **font**: PSF2 glyph store
//! - **renderer**: grid placement, glyph rasterizer and event handling

pub mod font;
pub mod framebuffer;
pub mod renderer;

pub use font::Font;
pub use framebuffer::Framebuffer;
pub use renderer::{Geometry, Renderer};

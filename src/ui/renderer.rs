//! Framebuffer renderer
//!
//! Turns terminal state into pixels. The renderer owns the framebuffer,
//! the glyph store and the palette, places the cell grid centered on the
//! screen, and reacts to terminal events by repainting dirty lines and
//! the cursor cell. It is the only writer of the pixel mapping.

use std::io::Write;

use crate::config::ColorScheme;
use crate::core::term::{AttrFlags, EventSink, TermEvent, TerminalState};
use crate::ui::font::Font;
use crate::ui::framebuffer::Framebuffer;

/// Placement of the cell grid within the framebuffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
    /// Pixel offset of the grid's top-left corner
    pub origin_x: usize,
    pub origin_y: usize,
}

impl Geometry {
    /// Center a grid of `requested_cols` columns on the framebuffer.
    ///
    /// Columns clamp to what the width fits; rows always fill the
    /// available height. Returns `None` when not even one glyph fits.
    pub fn compute(
        fb_width: usize,
        fb_height: usize,
        font: &Font,
        requested_cols: u16,
    ) -> Option<Self> {
        let max_cols = (fb_width / font.width()).min(u16::MAX as usize) as u16;
        let rows = (fb_height / font.height()).min(u16::MAX as usize) as u16;
        if max_cols == 0 || rows == 0 {
            return None;
        }

        let cols = requested_cols.clamp(1, max_cols);
        let origin_x = (fb_width - cols as usize * font.width()) / 2;
        let origin_y = (fb_height - rows as usize * font.height()) / 2;

        Some(Self {
            cols,
            rows,
            origin_x,
            origin_y,
        })
    }
}

/// Terminal renderer: rasterizer plus event handling
pub struct Renderer<W: Write> {
    fb: Framebuffer,
    font: Font,
    scheme: ColorScheme,
    geometry: Geometry,
    /// Last-known cursor cell (col, row); mutated only by event handling
    cursor: (u16, u16),
    /// Sink for answerback bytes (the PTY master in production)
    answerback: W,
}

impl<W: Write> Renderer<W> {
    pub fn new(
        fb: Framebuffer,
        font: Font,
        scheme: ColorScheme,
        geometry: Geometry,
        answerback: W,
    ) -> Self {
        Self {
            fb,
            font,
            scheme,
            geometry,
            cursor: (0, 0),
            answerback,
        }
    }

    #[allow(dead_code)]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Read access to the surface, for pixel-level inspection
    #[allow(dead_code)]
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.fb
    }

    /// Blit one glyph into its cell.
    ///
    /// Out-of-range codes leave the cell untouched. This is the hot loop:
    /// one bit test per pixel, nothing else.
    fn draw_glyph(&mut self, cell_x: usize, cell_y: usize, code: usize, fg: u32, bg: u32) {
        if code >= self.font.glyph_count() {
            return;
        }

        let px = cell_x * self.font.width() + self.geometry.origin_x;
        let py = cell_y * self.font.height() + self.geometry.origin_y;

        for gy in 0..self.font.height() {
            for gx in 0..self.font.width() {
                let color = if self.font.bit(code, gx, gy) { fg } else { bg };
                self.fb.write_pixel(px + gx, py + gy, color);
            }
        }
    }

    /// Repaint one grid line, applying cursor inversion
    fn draw_line(&mut self, term: &TerminalState, row: usize) {
        let (cursor_col, cursor_row) = self.cursor;
        let cols = term.cols.min(self.geometry.cols) as usize;

        for col in 0..cols {
            let cell = &term.line(row)[col];
            let mut fg = self.scheme.pixel(cell.attrs.fg, true);
            let mut bg = self.scheme.pixel(cell.attrs.bg, false);

            // XOR, not OR: a reverse-video cell under the cursor renders
            // normal rather than doubly inverted
            let is_cursor = cursor_row as usize == row && cursor_col as usize == col;
            if is_cursor ^ cell.attrs.flags.contains(AttrFlags::REVERSE) {
                std::mem::swap(&mut fg, &mut bg);
            }

            self.draw_glyph(col, row, cell.ch as usize, fg, bg);
        }
    }
}

impl<W: Write> EventSink for Renderer<W> {
    fn on_event(&mut self, event: TermEvent<'_>, term: &TerminalState) {
        match event {
            TermEvent::Bell => {} // no bell, audible or visual

            TermEvent::ScreenUpdate => {
                let rows = term.rows.min(self.geometry.rows) as usize;
                for row in 0..rows {
                    if term.is_line_dirty(row) {
                        self.draw_line(term, row);
                    }
                }
            }

            TermEvent::CursorMoved { row, col } => {
                let row = row.min(self.geometry.rows.min(term.rows).saturating_sub(1));
                let col = col.min(self.geometry.cols.min(term.cols).saturating_sub(1));

                let old_row = self.cursor.1;
                self.cursor = (col, row);
                self.draw_line(term, row as usize);
                if old_row != row {
                    self.draw_line(term, old_row as usize);
                }
            }

            TermEvent::Answerback(bytes) => {
                if let Err(e) = self.answerback.write_all(bytes) {
                    tracing::warn!("dropped answerback write: {}", e);
                }
            }

            TermEvent::CursorVisibility(_) => {} // observed, not rendered
        }
    }
}

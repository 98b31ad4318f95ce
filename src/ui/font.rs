//! PSF2 console font loading
//!
//! Console fonts ship as PSF2 archives, usually gzip-compressed, holding a
//! fixed-size header and packed 1-bit-per-pixel glyph bitmaps. The store is
//! immutable after loading; the renderer queries single glyph pixels
//! through [`Font::bit`].

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FontError {
    #[error("Failed to open font {0}: {1}")]
    Open(PathBuf, #[source] io::Error),

    #[error("Failed to read font header: {0}")]
    Header(#[source] io::Error),

    #[error("Not a PSF2 font (bad magic)")]
    BadMagic,

    #[error("Unusable font geometry: {count} glyphs of {charsize} bytes, {width}x{height} px")]
    BadGeometry {
        count: u32,
        charsize: u32,
        width: u32,
        height: u32,
    },

    #[error("Truncated font data: {0}")]
    Truncated(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, FontError>;

const PSF2_MAGIC: u32 = 0x864a_b572;
const PSF2_HEADER_LEN: usize = 32;

/// A decoded fixed-cell bitmap font
#[derive(Debug)]
pub struct Font {
    /// Number of glyphs
    length: usize,
    /// Bytes per glyph record
    charsize: usize,
    /// Glyph width in pixels
    width: usize,
    /// Glyph height in pixels
    height: usize,
    /// Packed row-major, MSB-first glyph bitmaps
    glyphs: Vec<u8>,
}

impl Font {
    /// Load a PSF2 font, transparently decompressing gzip archives.
    /// Plain uncompressed fonts load as-is.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| FontError::Open(path.to_path_buf(), e))?;
        let mut buffered = BufReader::new(file);

        let head = buffered.fill_buf().map_err(FontError::Header)?;
        let gzipped = head.starts_with(&[0x1f, 0x8b]);

        if gzipped {
            Self::read_from(&mut GzDecoder::new(buffered))
        } else {
            Self::read_from(&mut buffered)
        }
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; PSF2_HEADER_LEN];
        reader.read_exact(&mut header).map_err(FontError::Header)?;

        let field = |n: usize| u32::from_le_bytes(header[n * 4..n * 4 + 4].try_into().unwrap());
        if field(0) != PSF2_MAGIC {
            return Err(FontError::BadMagic);
        }
        let headersize = field(2);
        let length = field(4);
        let charsize = field(5);
        let height = field(6);
        let width = field(7);

        // Skip any header bytes beyond the fixed 32
        if headersize as usize > PSF2_HEADER_LEN {
            let extra = headersize as usize - PSF2_HEADER_LEN;
            io::copy(&mut reader.by_ref().take(extra as u64), &mut io::sink())
                .map_err(FontError::Header)?;
        }

        let total = (length as usize).checked_mul(charsize as usize);
        let stride_ok = height > 0 && charsize / height >= (width + 7) / 8;
        let total = match total {
            Some(n) if n > 0 && stride_ok => n,
            _ => {
                return Err(FontError::BadGeometry {
                    count: length,
                    charsize,
                    width,
                    height,
                })
            }
        };

        let mut glyphs = vec![0u8; total];
        reader.read_exact(&mut glyphs).map_err(FontError::Truncated)?;

        Self::from_parts(length as usize, charsize as usize, width as usize, height as usize, glyphs)
    }

    /// Build a font from already-decoded parts. Used by the loader and by
    /// tests that construct glyphs in memory.
    pub fn from_parts(
        length: usize,
        charsize: usize,
        width: usize,
        height: usize,
        glyphs: Vec<u8>,
    ) -> Result<Self> {
        if length == 0
            || height == 0
            || width == 0
            || charsize / height.max(1) < (width + 7) / 8
            || glyphs.len() != length * charsize
        {
            return Err(FontError::BadGeometry {
                count: length as u32,
                charsize: charsize as u32,
                width: width as u32,
                height: height as u32,
            });
        }
        Ok(Self {
            length,
            charsize,
            width,
            height,
            glyphs,
        })
    }

    pub fn glyph_count(&self) -> usize {
        self.length
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether glyph pixel (gx, gy) of `code` is set.
    ///
    /// Codes outside the loaded range and coordinates outside the glyph box
    /// read as background rather than faulting.
    #[inline]
    pub fn bit(&self, code: usize, gx: usize, gy: usize) -> bool {
        if code >= self.length || gx >= self.width || gy >= self.height {
            return false;
        }
        let stride = self.charsize / self.height;
        let byte = self.glyphs[code * self.charsize + gy * stride + gx / 8];
        byte >> (7 - gx % 8) & 1 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// 2 glyphs, 8x2 pixels, 2 bytes per glyph
    fn sample_font_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        for v in [PSF2_MAGIC, 0, 32, 0, 2, 2, 2, 8] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&[0b1000_0001, 0xff]); // glyph 0
        data.extend_from_slice(&[0b0101_0101, 0x00]); // glyph 1
        data
    }

    #[test]
    fn test_bit_decoding() {
        let font = Font::from_parts(2, 2, 8, 2, sample_font_bytes()[32..].to_vec()).unwrap();

        // MSB is the leftmost pixel
        assert!(font.bit(0, 0, 0));
        assert!(!font.bit(0, 1, 0));
        assert!(font.bit(0, 7, 0));
        assert!((0..8).all(|gx| font.bit(0, gx, 1)));

        assert!(!font.bit(1, 0, 0));
        assert!(font.bit(1, 1, 0));
        assert!((0..8).all(|gx| !font.bit(1, gx, 1)));
    }

    #[test]
    fn test_out_of_range_reads_background() {
        let font = Font::from_parts(2, 2, 8, 2, sample_font_bytes()[32..].to_vec()).unwrap();
        assert!(!font.bit(2, 0, 0));
        assert!(!font.bit(usize::MAX, 0, 0));
        assert!(!font.bit(0, 8, 0));
        assert!(!font.bit(0, 0, 2));
    }

    #[test]
    fn test_load_gzipped() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&sample_font_bytes()).unwrap();
        tmp.write_all(&encoder.finish().unwrap()).unwrap();

        let font = Font::load(tmp.path()).unwrap();
        assert_eq!(font.glyph_count(), 2);
        assert_eq!(font.width(), 8);
        assert_eq!(font.height(), 2);
        assert!(font.bit(0, 0, 0));
    }

    #[test]
    fn test_load_plain() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&sample_font_bytes()).unwrap();

        let font = Font::load(tmp.path()).unwrap();
        assert_eq!(font.glyph_count(), 2);
    }

    #[test]
    fn test_missing_font_fails() {
        let err = Font::load(Path::new("/no/such/font.psfu.gz")).unwrap_err();
        assert!(matches!(err, FontError::Open(..)));
    }

    #[test]
    fn test_truncated_font_fails() {
        let mut bytes = sample_font_bytes();
        bytes.truncate(bytes.len() - 1);

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();

        let err = Font::load(tmp.path()).unwrap_err();
        assert!(matches!(err, FontError::Truncated(_)));
    }

    #[test]
    fn test_bad_magic_fails() {
        let mut bytes = sample_font_bytes();
        bytes[0] = 0;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();

        let err = Font::load(tmp.path()).unwrap_err();
        assert!(matches!(err, FontError::BadMagic));
    }
}

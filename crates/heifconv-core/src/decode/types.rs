//! Core types for tile decoding.

use thiserror::Error;

/// Error types for tile decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The decoder rejected the coded access unit.
    #[error("Decoder rejected bitstream: {0}")]
    Submit(String),

    /// The access unit was accepted but no frame came out.
    #[error("Decoder produced no frame")]
    NoFrame,

    /// The decoder backend could not be started or driven.
    #[error("Decoder backend error: {0}")]
    Backend(String),

    /// The decoded frame is malformed or in an unsupported layout.
    #[error("Invalid decoded frame: {0}")]
    InvalidFrame(String),

    /// A tile decoded to a size other than the container declares.
    #[error("Tile {item} decoded to {}x{} but {}x{} was expected", actual.0, actual.1, expected.0, expected.1)]
    TileSizeMismatch {
        item: u32,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Chroma subsampling of a planar frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaFormat {
    /// Chroma planes at half width and half height.
    Yuv420,
    /// Chroma planes at half width, full height.
    Yuv422,
    /// Chroma planes at full resolution.
    Yuv444,
}

impl ChromaFormat {
    /// Size of one chroma plane for a `width x height` luma plane.
    pub fn chroma_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            ChromaFormat::Yuv420 => (width.div_ceil(2), height.div_ceil(2)),
            ChromaFormat::Yuv422 => (width.div_ceil(2), height),
            ChromaFormat::Yuv444 => (width, height),
        }
    }

    /// Horizontal and vertical chroma shift.
    #[inline]
    pub(crate) fn shifts(self) -> (u32, u32) {
        match self {
            ChromaFormat::Yuv420 => (1, 1),
            ChromaFormat::Yuv422 => (1, 0),
            ChromaFormat::Yuv444 => (0, 0),
        }
    }
}

/// One 8-bit planar YCbCr frame as handed out by a decoder session.
///
/// Planes are tightly packed (stride equals plane width).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarFrame {
    pub width: u32,
    pub height: u32,
    pub chroma: ChromaFormat,
    pub y: Vec<u8>,
    pub cb: Vec<u8>,
    pub cr: Vec<u8>,
}

impl PlanarFrame {
    /// Check that plane sizes agree with the frame geometry.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(DecodeError::InvalidFrame(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }

        let luma = self.width as usize * self.height as usize;
        let (cw, ch) = self.chroma.chroma_dimensions(self.width, self.height);
        let chroma = cw as usize * ch as usize;

        if self.y.len() != luma || self.cb.len() != chroma || self.cr.len() != chroma {
            return Err(DecodeError::InvalidFrame(format!(
                "plane sizes {}/{}/{} do not match {}x{} {:?}",
                self.y.len(),
                self.cb.len(),
                self.cr.len(),
                self.width,
                self.height,
                self.chroma
            )));
        }
        Ok(())
    }
}

/// A decoded tile as interleaved RGB (3 bytes per pixel, row-major, no padding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTile {
    /// Pixel data; length is `width * height * 3`.
    pub data: Vec<u8>,
    /// Width in pixels, taken from the decoded frame.
    pub width: u32,
    /// Height in pixels, taken from the decoded frame.
    pub height: u32,
}

impl DecodedTile {
    /// Create a tile from pixel data and dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * 3,
            "Pixel buffer size mismatch"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

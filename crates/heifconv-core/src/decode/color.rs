//! YCbCr to interleaved RGB conversion.
//!
//! Fixed-point arithmetic: full-range matrices are scaled by 256, limited-range
//! matrices by 8192 with a luma bias of 16. Per-value contributions are
//! precomputed into lookup tables when a [`ColorConverter`] is built.

use serde::{Deserialize, Serialize};

use super::{DecodeError, DecodedTile, PlanarFrame};
use crate::container::NclxColor;

/// YCbCr to RGB matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorMatrix {
    #[default]
    Bt601,
    Bt709,
    Bt2020,
}

impl ColorMatrix {
    /// Map an ITU-T H.273 `matrix_coefficients` code. Unknown codes fall back to BT.601.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => ColorMatrix::Bt709,
            9 | 10 => ColorMatrix::Bt2020,
            _ => ColorMatrix::Bt601,
        }
    }
}

/// Colour interpretation of decoded planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorParams {
    pub matrix: ColorMatrix,
    /// Full (0-255) rather than limited (16-235) sample range.
    pub full_range: bool,
}

impl ColorParams {
    pub fn new(matrix: ColorMatrix, full_range: bool) -> Self {
        Self { matrix, full_range }
    }

    /// Derive parameters from an `nclx` colour property.
    pub fn from_nclx(color: &NclxColor) -> Self {
        Self {
            matrix: ColorMatrix::from_code(color.matrix_coefficients),
            full_range: color.full_range,
        }
    }

    /// (cr_r, cb_g, cr_g, cb_b, y_bias, y_scale, rounding, shift)
    fn coefficients(self) -> (i32, i32, i32, i32, i32, i32, i32, u32) {
        if self.full_range {
            let (cr_r, cb_g, cr_g, cb_b) = match self.matrix {
                ColorMatrix::Bt601 => (359, -88, -183, 454),
                ColorMatrix::Bt709 => (403, -48, -120, 475),
                ColorMatrix::Bt2020 => (377, -42, -146, 482),
            };
            (cr_r, cb_g, cr_g, cb_b, 0, 256, 128, 8)
        } else {
            let (cr_r, cb_g, cr_g, cb_b) = match self.matrix {
                ColorMatrix::Bt601 => (13126, -3222, -6686, 16591),
                ColorMatrix::Bt709 => (14744, -1754, -4383, 17373),
                ColorMatrix::Bt2020 => (13806, -1541, -5349, 17615),
            };
            (cr_r, cb_g, cr_g, cb_b, 16, 9576, 4096, 13)
        }
    }
}

/// Per-task colour conversion context.
///
/// Holds lookup tables and a chroma row scratch buffer. Conversion takes
/// `&mut self`, so a converter cannot be shared between concurrent decodes;
/// give each worker its own.
#[derive(Debug, Clone)]
pub struct ColorConverter {
    params: ColorParams,
    shift: u32,
    /// Scaled luma with rounding folded in.
    y_lut: [i32; 256],
    cr_r: [i32; 256],
    cb_g: [i32; 256],
    cr_g: [i32; 256],
    cb_b: [i32; 256],
    /// Chroma contribution (r, g, b) for each sample of the current chroma row.
    chroma_row: Vec<[i32; 3]>,
}

impl ColorConverter {
    pub fn new(params: ColorParams) -> Self {
        let (cr_r, cb_g, cr_g, cb_b, y_bias, y_scale, rounding, shift) = params.coefficients();

        let table = |f: &dyn Fn(i32) -> i32| -> [i32; 256] {
            let mut lut = [0i32; 256];
            for (value, slot) in lut.iter_mut().enumerate() {
                *slot = f(value as i32);
            }
            lut
        };

        Self {
            params,
            shift,
            y_lut: table(&|y| (y - y_bias) * y_scale + rounding),
            cr_r: table(&|cr| cr_r * (cr - 128)),
            cb_g: table(&|cb| cb_g * (cb - 128)),
            cr_g: table(&|cr| cr_g * (cr - 128)),
            cb_b: table(&|cb| cb_b * (cb - 128)),
            chroma_row: Vec::new(),
        }
    }

    pub fn params(&self) -> ColorParams {
        self.params
    }

    /// Convert a planar frame into an owned interleaved RGB tile.
    ///
    /// The output buffer is exactly `width * height * 3` bytes.
    pub fn convert(&mut self, frame: &PlanarFrame) -> Result<DecodedTile, DecodeError> {
        frame.validate()?;

        let width = frame.width as usize;
        let height = frame.height as usize;
        let (x_shift, y_shift) = frame.chroma.shifts();
        let (chroma_width, _) = frame.chroma.chroma_dimensions(frame.width, frame.height);
        let chroma_width = chroma_width as usize;

        let mut rgb = vec![0u8; width * height * 3];
        let mut cached_row = None;

        for (y, (out_row, luma_row)) in rgb
            .chunks_exact_mut(width * 3)
            .zip(frame.y.chunks_exact(width))
            .enumerate()
        {
            let chroma_y = y >> y_shift;
            if cached_row != Some(chroma_y) {
                self.load_chroma_row(frame, chroma_y * chroma_width, chroma_width);
                cached_row = Some(chroma_y);
            }

            for (x, (px, &luma)) in out_row.chunks_exact_mut(3).zip(luma_row).enumerate() {
                let yv = self.y_lut[luma as usize];
                let [r, g, b] = self.chroma_row[x >> x_shift];
                px[0] = ((yv + r) >> self.shift).clamp(0, 255) as u8;
                px[1] = ((yv + g) >> self.shift).clamp(0, 255) as u8;
                px[2] = ((yv + b) >> self.shift).clamp(0, 255) as u8;
            }
        }

        Ok(DecodedTile::new(rgb, frame.width, frame.height))
    }

    fn load_chroma_row(&mut self, frame: &PlanarFrame, start: usize, len: usize) {
        let Self {
            cr_r,
            cb_g,
            cr_g,
            cb_b,
            chroma_row,
            ..
        } = self;

        let cb_plane = &frame.cb[start..start + len];
        let cr_plane = &frame.cr[start..start + len];
        chroma_row.clear();
        chroma_row.extend(cb_plane.iter().zip(cr_plane).map(|(&cb, &cr)| {
            [
                cr_r[cr as usize],
                cb_g[cb as usize] + cr_g[cr as usize],
                cb_b[cb as usize],
            ]
        }));
    }
}

impl Default for ColorConverter {
    fn default() -> Self {
        Self::new(ColorParams::default())
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================

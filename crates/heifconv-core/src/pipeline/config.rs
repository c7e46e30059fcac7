//! Conversion settings threaded through the pipeline driver.

use serde::{Deserialize, Serialize};

use crate::decode::ColorParams;
use crate::encode::DEFAULT_QUALITY;

/// What to reconstruct from the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvertMode {
    /// Decode every tile and composite the full grid image.
    #[default]
    Full,
    /// Decode only the grid's thumbnail item.
    Thumbnail,
}

/// How tiles are scheduled for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    /// One tile after another on the calling thread.
    #[default]
    Sequential,
    /// One task per tile on a rayon pool, joined before compositing.
    ///
    /// `threads: None` uses the global pool; `Some(n)` builds a dedicated
    /// pool of `n` workers for the conversion.
    Parallel { threads: Option<usize> },
}

impl DecodeStrategy {
    pub fn is_parallel(&self) -> bool {
        matches!(self, DecodeStrategy::Parallel { .. })
    }
}

/// Settings for one conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// JPEG quality, 1-100.
    pub quality: u8,
    pub mode: ConvertMode,
    pub decode: DecodeStrategy,
    /// Report timings at `info` level instead of `debug`.
    pub verbose: bool,
    /// Colour interpretation of decoded tiles. `None` uses the tile's
    /// `nclx` property, or BT.601 limited range without one.
    pub color: Option<ColorParams>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            mode: ConvertMode::Full,
            decode: DecodeStrategy::Sequential,
            verbose: false,
            color: None,
        }
    }
}

impl ConvertConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set JPEG quality, clamped to 1-100.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn with_mode(mut self, mode: ConvertMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_decode(mut self, decode: DecodeStrategy) -> Self {
        self.decode = decode;
        self
    }

    /// Decode tiles in parallel, optionally on a pool of `threads` workers.
    pub fn parallel(self, threads: Option<usize>) -> Self {
        self.with_decode(DecodeStrategy::Parallel { threads })
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_color(mut self, color: ColorParams) -> Self {
        self.color = Some(color);
        self
    }
}

use std::fmt::Debug;
use std::path::PathBuf;

use ndarray::Array3;
use num_traits::{NumCast, ToPrimitive};

use crate::compute::ComputeBackend;
use crate::config::DeinterlaceConfig;
use crate::deinterlace::{deinterlace_reported, estimate_offsets, BlockOffset};
use crate::error::Result;
use crate::progress::ProgressReporter;

/// Element type of a frame stack.
///
/// Any primitive integer or float qualifies. Samples are widened to `f64` for
/// estimation and the stack itself is never converted, so the caller's type
/// survives every combination of options.
pub trait Pixel: Copy + Debug + Default + Send + Sync + NumCast + ToPrimitive + 'static {
    fn as_f64(self) -> f64 {
        self.to_f64().unwrap_or(0.0)
    }
}

impl<T> Pixel for T where T: Copy + Debug + Default + Send + Sync + NumCast + ToPrimitive + 'static {}

/// A decoded stack of mono frames, shape = (frames, rows, columns).
#[derive(Clone, Debug, PartialEq)]
pub enum FrameStack {
    U8(Array3<u8>),
    U16(Array3<u16>),
}

impl FrameStack {
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            Self::U8(data) => data.dim(),
            Self::U16(data) => data.dim(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.dim().0
    }

    pub fn height(&self) -> usize {
        self.dim().1
    }

    pub fn width(&self) -> usize {
        self.dim().2
    }

    /// Storage bits per sample (8 or 16).
    pub fn sample_bits(&self) -> u8 {
        match self {
            Self::U8(_) => 8,
            Self::U16(_) => 16,
        }
    }

    /// Deinterlace the stack in place, returning the offset applied to each block.
    pub fn deinterlace(
        &mut self,
        config: &DeinterlaceConfig,
        backend: &dyn ComputeBackend,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<BlockOffset>> {
        match self {
            Self::U8(data) => deinterlace_reported(data.view_mut(), config, backend, reporter),
            Self::U16(data) => deinterlace_reported(data.view_mut(), config, backend, reporter),
        }
    }

    /// Estimate per-block offsets without touching the pixels.
    pub fn estimate_offsets(
        &self,
        config: &DeinterlaceConfig,
        backend: &dyn ComputeBackend,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<BlockOffset>> {
        match self {
            Self::U8(data) => estimate_offsets(data.view(), config, backend, reporter),
            Self::U16(data) => estimate_offsets(data.view(), config, backend, reporter),
        }
    }
}

/// Color/Bayer mode of the source data.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ColorMode {
    Mono,
    BayerRGGB,
    BayerGRBG,
    BayerGBRG,
    BayerBGGR,
    RGB,
    BGR,
}

/// Metadata about the source file.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub filename: PathBuf,
    pub total_frames: usize,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_mode: ColorMode,
    pub observer: Option<String>,
    pub instrument: Option<String>,
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compute::DevicePreference;
use crate::error::{DeinterlaceError, Result};

/// Options for one deinterlacing run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeinterlaceConfig {
    /// Frames per offset estimate. `None` estimates once over the whole stack.
    #[serde(default)]
    pub block_size: Option<usize>,
    /// Estimate on the per-pixel standard deviation of each block instead of
    /// the raw frames. Better suited to sparse or low-SNR recordings.
    #[serde(default)]
    pub subsample: bool,
    /// Leading frames corrected one at a time before block-wise processing.
    #[serde(default)]
    pub unstable: Option<usize>,
}

impl DeinterlaceConfig {
    /// Check the options against a stack of `frame_count` frames.
    ///
    /// A block size larger than the stack is accepted; the single block is
    /// simply truncated.
    pub fn validate(&self, frame_count: usize) -> Result<()> {
        if self.block_size == Some(0) {
            return Err(DeinterlaceError::InvalidBlockSize);
        }
        if let Some(unstable) = self.unstable {
            if unstable > frame_count {
                return Err(DeinterlaceError::InvalidUnstable {
                    unstable,
                    frames: frame_count,
                });
            }
        }
        Ok(())
    }
}

/// A complete CLI job, loadable from TOML.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub device: DevicePreference,
    #[serde(default)]
    pub deinterlace: DeinterlaceConfig,
}

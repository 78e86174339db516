//! Block-wise deinterlacing of resonant-scan frame stacks.
//!
//! Each block from the [`BlockSchedule`] gets one offset estimate, which is
//! applied to the odd rows of that block before the next block starts.
//! Correction is progressive and not transactional: if a block fails, the
//! blocks before it stay corrected. Callers that need all-or-nothing
//! behaviour should work on a copy, e.g. through [`deinterlaced`].

use ndarray::{Array3, ArrayView3, ArrayViewMut3, Axis, Slice};
use tracing::{debug, info};

use crate::compute::ComputeBackend;
use crate::config::DeinterlaceConfig;
use crate::correct::correct_block;
use crate::error::Result;
use crate::estimate::PhaseOffsetEstimator;
use crate::frame::Pixel;
use crate::progress::{NoOpReporter, ProgressReporter};
use crate::schedule::{Block, BlockSchedule};
use crate::subsample::subsample_proxy;

/// Offset estimated for one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockOffset {
    pub block: Block,
    pub offset: i32,
}

/// Deinterlace `images` (frames, rows, columns) in place.
///
/// `backend` is the process-wide compute backend from
/// [`crate::compute::create_backend`].
pub fn deinterlace<T: Pixel>(
    images: ArrayViewMut3<'_, T>,
    config: &DeinterlaceConfig,
    backend: &dyn ComputeBackend,
) -> Result<()> {
    deinterlace_reported(images, config, backend, &NoOpReporter).map(|_| ())
}

/// [`deinterlace`] with per-block progress, returning the offsets applied.
pub fn deinterlace_reported<T: Pixel>(
    mut images: ArrayViewMut3<'_, T>,
    config: &DeinterlaceConfig,
    backend: &dyn ComputeBackend,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<BlockOffset>> {
    let frames = images.len_of(Axis(0));
    run_blocks(frames, config, backend, reporter, |estimator, block| {
        let offset = estimate_block(estimator, images.view(), block, config.subsample)?;
        correct_block(images.view_mut(), block, offset);
        Ok(offset)
    })
}

/// Run scheduling and estimation only, leaving `images` untouched.
pub fn estimate_offsets<T: Pixel>(
    images: ArrayView3<'_, T>,
    config: &DeinterlaceConfig,
    backend: &dyn ComputeBackend,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<BlockOffset>> {
    run_blocks(images.len_of(Axis(0)), config, backend, reporter, |estimator, block| {
        estimate_block(estimator, images.view(), block, config.subsample)
    })
}

/// Non-mutating [`deinterlace`]: returns a corrected copy.
pub fn deinterlaced<T: Pixel>(
    images: ArrayView3<'_, T>,
    config: &DeinterlaceConfig,
    backend: &dyn ComputeBackend,
) -> Result<Array3<T>> {
    let mut corrected = images.to_owned();
    deinterlace(corrected.view_mut(), config, backend)?;
    Ok(corrected)
}

/// Walk the schedule for `frames` frames in order. `step` estimates one
/// block and may correct it before the next block is visited.
fn run_blocks<F>(
    frames: usize,
    config: &DeinterlaceConfig,
    backend: &dyn ComputeBackend,
    reporter: &dyn ProgressReporter,
    mut step: F,
) -> Result<Vec<BlockOffset>>
where
    F: FnMut(&PhaseOffsetEstimator<'_>, Block) -> Result<i32>,
{
    let schedule = BlockSchedule::from_config(frames, config)?;
    log_run(&schedule, config, backend);

    let estimator = PhaseOffsetEstimator::new(backend);
    let mut offsets = Vec::with_capacity(schedule.len());
    reporter.begin(schedule.len());

    for (i, block) in schedule.iter().enumerate() {
        let offset = step(&estimator, block)?;
        debug!(start = block.start, stop = block.stop, offset, "Block done");
        offsets.push(BlockOffset { block, offset });
        reporter.advance(i + 1);
    }

    reporter.finish();
    Ok(offsets)
}

fn estimate_block<T: Pixel>(
    estimator: &PhaseOffsetEstimator<'_>,
    images: ArrayView3<'_, T>,
    block: Block,
    subsample: bool,
) -> Result<i32> {
    let frames = images.slice_axis(Axis(0), Slice::from(block.range()));
    if subsample {
        let proxy = subsample_proxy(frames)?;
        estimator.estimate(proxy.view())
    } else {
        estimator.estimate(frames)
    }
}

fn log_run(schedule: &BlockSchedule, config: &DeinterlaceConfig, backend: &dyn ComputeBackend) {
    info!(
        frames = schedule.frame_count(),
        blocks = schedule.len(),
        block_size = schedule.block_size(),
        unstable = schedule.unstable(),
        subsample = config.subsample,
        device = backend.name(),
        "Deinterlacing"
    );
}

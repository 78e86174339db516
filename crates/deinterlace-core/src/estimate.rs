use ndarray::{Array2, ArrayView3, Axis};
use tracing::warn;

use crate::compute::ComputeBackend;
use crate::consts::{PEAK_SEARCH_RADIUS, PHASE_EPSILON};
use crate::error::{DeinterlaceError, Result};
use crate::frame::Pixel;

/// Estimates the integer column offset between the two scan directions of a
/// block by phase correlation.
///
/// Even rows are the forward scan lines and serve as the reference; odd rows
/// are the backward scan lines. The returned offset is the shift that, applied
/// to the odd rows by [`crate::correct::shift_backward_rows`], realigns them
/// with the even rows: if the odd rows are the even rows displaced right by
/// `s` columns, the estimate is `-s`.
pub struct PhaseOffsetEstimator<'a> {
    backend: &'a dyn ComputeBackend,
    epsilon: f64,
}

impl<'a> PhaseOffsetEstimator<'a> {
    pub fn new(backend: &'a dyn ComputeBackend) -> Self {
        Self {
            backend,
            epsilon: PHASE_EPSILON,
        }
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend
    }

    /// Estimate the offset for one block of shape (frames, rows, columns).
    ///
    /// Always returns a value in `[-PEAK_SEARCH_RADIUS, PEAK_SEARCH_RADIUS]`.
    /// Larger true offsets alias onto the strongest in-window lag.
    pub fn estimate<T: Pixel>(&self, block: ArrayView3<'_, T>) -> Result<i32> {
        let (frames, rows, cols) = block.dim();
        let invalid = |reason| DeinterlaceError::InvalidBlockShape {
            frames,
            rows,
            cols,
            reason,
        };
        if frames == 0 {
            return Err(invalid("block has no frames"));
        }
        if rows < 2 {
            return Err(invalid("need at least one forward and one backward row"));
        }
        if cols == 0 {
            return Err(invalid("frames have no columns"));
        }

        // With an odd row count there is one more even row than odd rows; the
        // surplus even row is dropped. Rows are independent under a row-wise
        // transform, so dropping it before the transform is the same as
        // truncating the spectrum afterwards.
        let pairs = rows / 2;
        let backward = scan_rows(&block, 1, pairs)?;
        let forward = scan_rows(&block, 0, pairs)?;

        let backend = self.backend;
        let backward = backend.upload(&backward)?;
        let backward = backend.fft_rows(&backward)?;
        let backward = backend.normalize_phase(&backward, self.epsilon)?;

        let forward = backend.upload(&forward)?;
        let forward = backend.fft_rows(&forward)?;
        let forward = backend.normalize_phase(&forward, self.epsilon)?;
        let forward = backend.conjugate(&forward)?;

        let cross_power = backend.complex_mul(&backward, &forward)?;
        let correlation = backend.ifft_rows_real(&cross_power)?;

        // Every frame contributes the same number of rows, so one mean over
        // all rows equals the mean over rows followed by the mean over frames.
        let profile = backend.column_mean(&correlation)?;
        let profile = fft_shift(&profile);

        if is_flat(&profile) {
            warn!(
                frames,
                rows, cols, "Correlation profile is flat; block has no structure to align"
            );
        }

        Ok(peak_offset(&profile, PEAK_SEARCH_RADIUS))
    }
}

/// Gather every other row starting at `parity`, `count` rows per frame, into
/// one (frames * count, columns) batch.
fn scan_rows<T: Pixel>(block: &ArrayView3<'_, T>, parity: usize, count: usize) -> Result<Array2<f64>> {
    let (frames, _, cols) = block.dim();
    let len = frames * count * cols;
    let mut samples = Vec::new();
    samples.try_reserve_exact(len).map_err(|e| {
        DeinterlaceError::ResourceExhausted(format!(
            "{}x{cols} scan-line batch: {e}",
            frames * count
        ))
    })?;

    for frame in block.axis_iter(Axis(0)) {
        for row in frame.axis_iter(Axis(0)).skip(parity).step_by(2).take(count) {
            samples.extend(row.iter().map(|v| v.as_f64()));
        }
    }

    Ok(Array2::from_shape_vec((frames * count, cols), samples)?)
}

/// Rotate a lag profile so that lag zero sits at index `len / 2`.
pub fn fft_shift(profile: &[f64]) -> Vec<f64> {
    let mut shifted = profile.to_vec();
    shifted.rotate_right(profile.len() / 2);
    shifted
}

/// Negated lag of the first maximum within `radius` samples of the centre of
/// a shifted profile. The window is clipped to the profile for short rows.
pub fn peak_offset(shifted: &[f64], radius: usize) -> i32 {
    if shifted.is_empty() {
        return 0;
    }
    let center = shifted.len() / 2;
    let start = center.saturating_sub(radius);
    let end = (center + radius).min(shifted.len() - 1);

    let mut best = start;
    for i in start..=end {
        if shifted[i] > shifted[best] {
            best = i;
        }
    }

    -(best as i64 - center as i64) as i32
}

fn is_flat(profile: &[f64]) -> bool {
    let (min, max) = profile
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    max - min <= f64::EPSILON * max.abs().max(1.0)
}

use std::sync::Arc;

use ndarray::{Array2, ArrayViewMut1, Axis, Zip};
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{DeinterlaceError, Result};

use super::{BufferInner, ComputeBackend, DeviceBuffer};

/// CPU backend: `rustfft` row transforms, Rayon across rows for large buffers.
pub struct CpuBackend;

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "CPU/Rayon"
    }

    fn upload(&self, data: &Array2<f64>) -> Result<DeviceBuffer> {
        let (h, w) = data.dim();
        let mut out = try_zeros(h, w)?;
        Zip::from(&mut out)
            .and(data)
            .for_each(|o, &v| *o = Complex::new(v, 0.0));
        Ok(DeviceBuffer::host(out))
    }

    fn download(&self, input: &DeviceBuffer) -> Result<Array2<Complex<f64>>> {
        try_copy(host_array(input)?)
    }

    fn fft_rows(&self, input: &DeviceBuffer) -> Result<DeviceBuffer> {
        let data = host_array(input)?;
        let mut out = try_copy(data)?;
        let fft = FftPlanner::new().plan_fft_forward(input.width);
        transform_rows(&mut out, &fft);
        Ok(DeviceBuffer::host(out))
    }

    fn ifft_rows_real(&self, input: &DeviceBuffer) -> Result<DeviceBuffer> {
        let data = host_array(input)?;
        let mut out = try_copy(data)?;
        let ifft = FftPlanner::new().plan_fft_inverse(input.width);
        transform_rows(&mut out, &ifft);

        let scale = 1.0 / input.width as f64;
        out.mapv_inplace(|v| Complex::new(v.re * scale, 0.0));
        Ok(DeviceBuffer::host(out))
    }

    fn normalize_phase(&self, input: &DeviceBuffer, epsilon: f64) -> Result<DeviceBuffer> {
        let data = host_array(input)?;
        let mut out = try_zeros(input.height, input.width)?;
        Zip::from(&mut out)
            .and(data)
            .for_each(|o, &v| *o = v / (v.norm() + epsilon));
        Ok(DeviceBuffer::host(out))
    }

    fn conjugate(&self, input: &DeviceBuffer) -> Result<DeviceBuffer> {
        let data = host_array(input)?;
        let mut out = try_zeros(input.height, input.width)?;
        Zip::from(&mut out).and(data).for_each(|o, v| *o = v.conj());
        Ok(DeviceBuffer::host(out))
    }

    fn complex_mul(&self, a: &DeviceBuffer, b: &DeviceBuffer) -> Result<DeviceBuffer> {
        a.ensure_same_dim(b)?;
        let a_data = host_array(a)?;
        let b_data = host_array(b)?;
        let mut out = try_zeros(a.height, a.width)?;
        Zip::from(&mut out)
            .and(a_data)
            .and(b_data)
            .for_each(|o, &x, &y| *o = x * y);
        Ok(DeviceBuffer::host(out))
    }

    fn column_mean(&self, input: &DeviceBuffer) -> Result<Vec<f64>> {
        let data = host_array(input)?;
        if input.height == 0 {
            return Err(DeinterlaceError::ShapeMismatch {
                left: input.dim(),
                right: (1, input.width),
            });
        }
        let mut sums = vec![0.0f64; input.width];
        for row in data.axis_iter(Axis(0)) {
            for (sum, v) in sums.iter_mut().zip(row.iter()) {
                *sum += v.re;
            }
        }
        let rows = input.height as f64;
        Ok(sums.into_iter().map(|s| s / rows).collect())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn host_array(buf: &DeviceBuffer) -> Result<&Array2<Complex<f64>>> {
    match &buf.inner {
        BufferInner::Host(arr) => Ok(arr),
        #[cfg(feature = "gpu")]
        _ => Err(DeinterlaceError::GpuError(
            "CpuBackend received a device buffer".into(),
        )),
    }
}

/// Allocate a zeroed complex buffer, reporting allocation failure as an error
/// instead of aborting.
fn try_zeros(h: usize, w: usize) -> Result<Array2<Complex<f64>>> {
    let exhausted = |detail: String| {
        DeinterlaceError::ResourceExhausted(format!("{h}x{w} complex buffer: {detail}"))
    };
    let len = h
        .checked_mul(w)
        .ok_or_else(|| exhausted("size overflow".into()))?;
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(len)
        .map_err(|e| exhausted(e.to_string()))?;
    storage.resize(len, Complex::new(0.0, 0.0));
    Ok(Array2::from_shape_vec((h, w), storage)?)
}

fn try_copy(data: &Array2<Complex<f64>>) -> Result<Array2<Complex<f64>>> {
    let (h, w) = data.dim();
    let mut out = try_zeros(h, w)?;
    out.assign(data);
    Ok(out)
}

fn transform_rows(data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
    let (h, w) = data.dim();
    if w == 0 {
        return;
    }
    if let Some(samples) = data.as_slice_mut() {
        if h * w >= PARALLEL_PIXEL_THRESHOLD {
            samples.par_chunks_mut(w).for_each(|row| fft.process(row));
        } else {
            samples.chunks_mut(w).for_each(|row| fft.process(row));
        }
        return;
    }
    for mut row in data.axis_iter_mut(Axis(0)) {
        transform_row(&mut row, fft.as_ref());
    }
}

fn transform_row(row: &mut ArrayViewMut1<Complex<f64>>, fft: &dyn Fft<f64>) {
    if let Some(slice) = row.as_slice_mut() {
        fft.process(slice);
    } else {
        let mut buf = row.to_vec();
        fft.process(&mut buf);
        for (dst, src) in row.iter_mut().zip(buf) {
            *dst = src;
        }
    }
}

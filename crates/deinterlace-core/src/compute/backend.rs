use std::fmt;
use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DeinterlaceError, Result};

use super::cpu::CpuBackend;

/// Which compute device to run the estimator on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevicePreference {
    /// GPU when one can be opened, CPU otherwise.
    #[default]
    Auto,
    Cpu,
    Gpu,
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "Auto"),
            Self::Cpu => write!(f, "CPU"),
            Self::Gpu => write!(f, "GPU"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum BufferInner {
    Host(Array2<Complex<f64>>),
    #[cfg(feature = "gpu")]
    Wgpu { buffer: wgpu::Buffer },
}

/// A batch of equal-length complex rows resident on a backend.
///
/// Real-valued data is stored with a zero imaginary part. Buffers are only
/// meaningful to the backend that produced them.
#[derive(Debug)]
pub struct DeviceBuffer {
    pub(crate) inner: BufferInner,
    pub height: usize,
    pub width: usize,
}

impl DeviceBuffer {
    pub(crate) fn host(data: Array2<Complex<f64>>) -> Self {
        let (height, width) = data.dim();
        Self {
            inner: BufferInner::Host(data),
            height,
            width,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub(crate) fn ensure_same_dim(&self, other: &DeviceBuffer) -> Result<()> {
        if self.dim() != other.dim() {
            return Err(DeinterlaceError::ShapeMismatch {
                left: self.dim(),
                right: other.dim(),
            });
        }
        Ok(())
    }
}

/// Array and transform primitives the offset estimator is written against.
///
/// All transforms run along the row (column-index) axis; every row of a
/// buffer is an independent signal. Calls are synchronous: they return once
/// the device work has completed. A GPU backend wraps a single stateful
/// device context, so callers sharing one across threads or processes must
/// serialize their runs themselves.
pub trait ComputeBackend: Send + Sync {
    fn name(&self) -> &str;

    fn is_gpu(&self) -> bool {
        false
    }

    /// Transfer real-valued rows onto the device.
    fn upload(&self, data: &Array2<f64>) -> Result<DeviceBuffer>;

    /// Transfer a buffer back to the host.
    fn download(&self, input: &DeviceBuffer) -> Result<Array2<Complex<f64>>>;

    /// Forward DFT of every row.
    fn fft_rows(&self, input: &DeviceBuffer) -> Result<DeviceBuffer>;

    /// Inverse DFT of every row scaled by `1 / width`, keeping the real part.
    fn ifft_rows_real(&self, input: &DeviceBuffer) -> Result<DeviceBuffer>;

    /// `x / (|x| + epsilon)` for every element.
    fn normalize_phase(&self, input: &DeviceBuffer, epsilon: f64) -> Result<DeviceBuffer>;

    fn conjugate(&self, input: &DeviceBuffer) -> Result<DeviceBuffer>;

    /// Elementwise complex product of two buffers of equal shape.
    fn complex_mul(&self, a: &DeviceBuffer, b: &DeviceBuffer) -> Result<DeviceBuffer>;

    /// Mean of the real part over all rows, transferred back to the host.
    fn column_mean(&self, input: &DeviceBuffer) -> Result<Vec<f64>>;
}

/// Check whether a GPU backend can be opened in this build and on this machine.
pub fn gpu_available() -> bool {
    #[cfg(feature = "gpu")]
    {
        super::wgpu_backend::WgpuBackend::adapter_present()
    }
    #[cfg(not(feature = "gpu"))]
    {
        false
    }
}

/// Select the process-wide compute backend.
///
/// `Auto` picks the GPU when available and the CPU otherwise. An explicit
/// `Gpu` request that cannot be satisfied is an error rather than a silent
/// downgrade.
pub fn create_backend(preference: &DevicePreference) -> Result<Arc<dyn ComputeBackend>> {
    match preference {
        DevicePreference::Cpu => Ok(Arc::new(CpuBackend)),
        DevicePreference::Gpu => open_gpu(),
        DevicePreference::Auto => match open_gpu() {
            Ok(backend) => Ok(backend),
            Err(e) => {
                info!(reason = %e, "GPU backend unavailable, using CPU");
                Ok(Arc::new(CpuBackend))
            }
        },
    }
}

#[cfg(feature = "gpu")]
fn open_gpu() -> Result<Arc<dyn ComputeBackend>> {
    let backend = super::wgpu_backend::WgpuBackend::new()?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "gpu"))]
fn open_gpu() -> Result<Arc<dyn ComputeBackend>> {
    Err(DeinterlaceError::GpuError(
        "built without the `gpu` feature".into(),
    ))
}

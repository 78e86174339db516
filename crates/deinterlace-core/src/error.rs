use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeinterlaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Block size must be at least 1")]
    InvalidBlockSize,

    #[error("Unstable prefix of {unstable} frames exceeds frame count {frames}")]
    InvalidUnstable { unstable: usize, frames: usize },

    #[error("Block shape {frames}x{rows}x{cols} cannot be deinterlaced: {reason}")]
    InvalidBlockShape {
        frames: usize,
        rows: usize,
        cols: usize,
        reason: &'static str,
    },

    #[error("Buffer shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Value {0} does not fit the stack's pixel type")]
    PixelCast(f64),

    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("Insufficient working memory: {0}")]
    ResourceExhausted(String),

    #[error("GPU error: {0}")]
    GpuError(String),
}

pub type Result<T> = std::result::Result<T, DeinterlaceError>;

/// Minimum element count (rows * width) to run row transforms with Rayon.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Added to spectral magnitudes before phase normalisation.
pub const PHASE_EPSILON: f64 = 1e-5;

/// Half-width, in columns, of the lag window searched for the correlation peak.
/// Estimated offsets always fall in `[-PEAK_SEARCH_RADIUS, PEAK_SEARCH_RADIUS]`.
pub const PEAK_SEARCH_RADIUS: usize = 10;

/// Number of identical frames in the standard-deviation proxy stack.
pub const SUBSAMPLE_PROXY_FRAMES: usize = 2;

/// Label shown next to the per-block progress bar.
pub const PROGRESS_LABEL: &str = "Deinterlacing resonant images";

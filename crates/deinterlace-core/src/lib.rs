pub mod compute;
pub mod config;
pub mod consts;
pub mod correct;
pub mod deinterlace;
pub mod error;
pub mod estimate;
pub mod frame;
pub mod io;
pub mod progress;
pub mod schedule;
pub mod subsample;

pub use deinterlace::{deinterlace, deinterlace_reported, deinterlaced, estimate_offsets, BlockOffset};

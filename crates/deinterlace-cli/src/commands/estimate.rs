use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use deinterlace_core::compute::{create_backend, DevicePreference};
use deinterlace_core::io::ser::SerReader;

use super::DeinterlaceArgs;
use crate::progress::BarReporter;
use crate::summary::print_offsets;

#[derive(Args)]
pub struct EstimateArgs {
    /// Input SER file
    pub file: PathBuf,

    #[command(flatten)]
    pub options: DeinterlaceArgs,
}

pub fn run(args: &EstimateArgs) -> Result<()> {
    let config = args.options.to_config();
    let device: DevicePreference = args.options.device.into();
    let backend = create_backend(&device)?;

    let reader = SerReader::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let stack = reader.read_stack()?;
    let (frames, height, width) = stack.dim();
    println!(
        "Estimating offsets for {} frames of {}x{} on {}",
        frames,
        width,
        height,
        backend.name()
    );

    let reporter = BarReporter::new()?;
    let offsets = stack.estimate_offsets(&config, backend.as_ref(), &reporter)?;

    print_offsets(&offsets);
    Ok(())
}

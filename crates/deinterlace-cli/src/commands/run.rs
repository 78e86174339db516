use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use deinterlace_core::compute::create_backend;
use deinterlace_core::io::ser::SerReader;
use deinterlace_core::io::ser_writer::write_ser;
use tracing::info;

use super::{resolve_run_config, DeinterlaceArgs};
use crate::progress::BarReporter;
use crate::summary::{print_offsets, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Input SER file
    #[arg(required_unless_present = "config")]
    pub file: Option<PathBuf>,

    /// Job config file (TOML); replaces the input, output and option flags
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub options: DeinterlaceArgs,

    /// Output file path
    #[arg(short, long, default_value = "deinterlaced.ser")]
    pub output: PathBuf,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = resolve_run_config(
        args.config.as_deref(),
        args.file.as_deref(),
        args.output.clone(),
        &args.options,
    )?;
    if config.output == config.input {
        bail!("Output {} would overwrite the input recording", config.output.display());
    }
    let backend = create_backend(&config.device)?;
    print_run_summary(&config, backend.name());

    let reader = SerReader::open(&config.input)
        .with_context(|| format!("Failed to open {}", config.input.display()))?;
    let mut stack = reader.read_stack()?;
    info!(
        frames = stack.frame_count(),
        width = stack.width(),
        height = stack.height(),
        bits = stack.sample_bits(),
        "Recording loaded"
    );

    let reporter = BarReporter::new()?;
    let offsets = stack.deinterlace(&config.deinterlace, backend.as_ref(), &reporter)?;
    print_offsets(&offsets);

    let timestamps = reader.timestamps();
    write_ser(
        &config.output,
        &stack,
        Some(&reader.header),
        timestamps.as_deref(),
    )
    .with_context(|| format!("Failed to write {}", config.output.display()))?;
    println!("Saved to {}", config.output.display());
    Ok(())
}

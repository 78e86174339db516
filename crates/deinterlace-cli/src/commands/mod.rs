pub mod config;
pub mod estimate;
pub mod info;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use deinterlace_core::compute::DevicePreference;
use deinterlace_core::config::{DeinterlaceConfig, RunConfig};

#[derive(Clone, Copy, ValueEnum)]
pub enum DeviceArg {
    Auto,
    Cpu,
    Gpu,
}

impl From<DeviceArg> for DevicePreference {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Auto => DevicePreference::Auto,
            DeviceArg::Cpu => DevicePreference::Cpu,
            DeviceArg::Gpu => DevicePreference::Gpu,
        }
    }
}

/// Options shared by every command that estimates offsets.
#[derive(Args)]
pub struct DeinterlaceArgs {
    /// Frames per offset estimate (default: whole recording)
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Estimate on the per-pixel standard deviation of each block
    #[arg(long)]
    pub subsample: bool,

    /// Leading frames corrected one at a time
    #[arg(long)]
    pub unstable: Option<usize>,

    /// Compute device
    #[arg(long, value_enum, default_value = "auto")]
    pub device: DeviceArg,
}

impl DeinterlaceArgs {
    pub fn to_config(&self) -> DeinterlaceConfig {
        DeinterlaceConfig {
            block_size: self.block_size,
            subsample: self.subsample,
            unstable: self.unstable,
        }
    }
}

/// Load a job from TOML, or assemble one from command-line flags.
pub fn resolve_run_config(
    config_path: Option<&Path>,
    input: Option<&Path>,
    output: PathBuf,
    options: &DeinterlaceArgs,
) -> Result<RunConfig> {
    if let Some(path) = config_path {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        return toml::from_str(&contents).context("Invalid job config");
    }
    let Some(input) = input else {
        bail!("No input file given");
    };
    Ok(RunConfig {
        input: input.to_path_buf(),
        output,
        device: options.device.into(),
        deinterlace: options.to_config(),
    })
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use deinterlace_core::compute::DevicePreference;
use deinterlace_core::config::{DeinterlaceConfig, RunConfig};

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a default RunConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let config = RunConfig {
        input: PathBuf::from("input.ser"),
        output: PathBuf::from("deinterlaced.ser"),
        device: DevicePreference::Auto,
        deinterlace: DeinterlaceConfig {
            block_size: Some(128),
            subsample: false,
            unstable: None,
        },
    };
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}

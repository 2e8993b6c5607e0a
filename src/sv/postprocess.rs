//! Implementation of `sv postprocess` sub command.

use std::path::PathBuf;

use clap::Parser;

use crate::conf::Config;
use crate::normalize::{postprocess_vcf, Flavor};

/// Caller that wrote the VCF file.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Caller {
    Pindel,
    Delly,
}

/// Command line arguments for `sv postprocess` sub command.
#[derive(Parser, Debug)]
#[command(about = "Normalize a pindel or delly VCF in place", long_about = None)]
pub struct Args {
    /// Path to the VCF file, rewritten in place.
    #[arg(long)]
    pub path_vcf: PathBuf,
    /// Caller that wrote the file.
    #[arg(long, value_enum)]
    pub caller: Caller,
    /// Path to the configuration file (TOML).
    #[arg(long)]
    pub path_config: Option<PathBuf>,
}

/// Main entry point for `sv postprocess` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let config = Config::load(args.path_config.as_deref(), None)
        .map_err(|e| anyhow::anyhow!("could not load configuration: {}", e))?;
    let flavor = match args.caller {
        Caller::Pindel => Flavor::Pindel {
            min_sv_length: config.pindel.min_sv_length,
        },
        Caller::Delly => Flavor::Delly,
    };

    let stats = postprocess_vcf(&args.path_vcf, flavor)
        .map_err(|e| anyhow::anyhow!("could not post-process {}: {}", args.path_vcf.display(), e))?;
    tracing::info!("{} of {} records kept", stats.written, stats.read);

    Ok(())
}

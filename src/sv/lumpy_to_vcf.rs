//! Implementation of `sv lumpy-to-vcf` sub command.

use std::path::PathBuf;

use clap::Parser;

use crate::callers::breakend::{report_to_vcf, SampleIndex};

/// Command line arguments for `sv lumpy-to-vcf` sub command.
#[derive(Parser, Debug)]
#[command(about = "Translate a lumpy breakend report to VCF", long_about = None)]
pub struct Args {
    /// Path to the lumpy report.
    #[arg(long)]
    pub path_input: PathBuf,
    /// Path to the VCF file to write.
    #[arg(long)]
    pub path_output: PathBuf,
    /// Sample identifiers in the order of lumpy's sample ids.
    #[arg(long, required = true, value_delimiter = ',')]
    pub sample: Vec<String>,
}

/// Main entry point for `sv lumpy-to-vcf` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let samples = SampleIndex::new(args.sample.iter().cloned());
    report_to_vcf(&args.path_input, &samples, &args.path_output).map_err(|e| {
        anyhow::anyhow!(
            "could not translate {}: {}",
            args.path_input.display(),
            e
        )
    })?;

    tracing::info!(
        "All of `sv lumpy-to-vcf` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

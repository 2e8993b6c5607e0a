//! Driving the callers for an alignment group (`call` sub command).

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::callers::{ToolRun, VariantTool};
use crate::common::{ensure_dir, io::write_atomically, uppercase_underscore, worker_version};
use crate::conf::Config;
use crate::downstream::{Downstream, LocalDownstream};
use crate::err::Error;
use crate::model::{
    AlignmentGroup, AlignmentGroupStatus, Dataset, DatasetType, GroupStore, JsonGroupStore,
};
use crate::params::get_common_tool_params;

/// Alignments that the callers are run on.
pub const ALIGNMENT_TYPE: DatasetType = DatasetType::BwaAlign;

/// Result of running one tool.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ToolReport {
    pub tool: VariantTool,
    pub succeeded: bool,
    /// Registered VCF on success.
    pub path: Option<PathBuf>,
    /// Error message on failure.
    pub error: Option<String>,
}

/// Output file of `tool` below the group's `vcf` directory, e.g.,
/// `vcf/freebayes/BWA_BAM.vcf`.
pub fn vcf_output_filename(
    output_dir: &Path,
    tool: VariantTool,
    alignment_type: DatasetType,
) -> PathBuf {
    output_dir.join(tool.name()).join(format!(
        "{}.vcf",
        uppercase_underscore(&alignment_type.to_string())
    ))
}

/// Register a ready dataset of `dataset_type`, replacing any previous one.
fn register(group: &mut AlignmentGroup, dataset_type: DatasetType, path: &Path) -> Dataset {
    let dataset = Dataset::ready(dataset_type, path);
    if let Some(previous) = group.supersede_dataset(dataset.clone()) {
        tracing::info!(
            "replaced {} dataset at {}",
            &previous.label,
            previous.path.display()
        );
    }
    dataset
}

/// Run `tool` on `group` and hand its result to `downstream`.
///
/// Returns `Ok(false)` if the tool ran but did not produce a complete VCF.
/// The group status is saved to `store` before the tool runs, and again
/// whenever a dataset is registered.
pub async fn find_variants_with_tool(
    group: &mut AlignmentGroup,
    tool: VariantTool,
    config: &Config,
    store: &mut dyn GroupStore,
    downstream: &mut dyn Downstream,
) -> Result<bool, Error> {
    group.set_status(AlignmentGroupStatus::VariantCalling)?;
    store.save(group)?;

    let (params, skipped) = get_common_tool_params(group, ALIGNMENT_TYPE)?;
    for (sample_uid, reason) in &skipped {
        tracing::warn!("skipping sample {}: {}", sample_uid, reason);
    }

    let output = vcf_output_filename(&params.output_dir, tool, params.alignment_type);
    let tool_dir = params.output_dir.join(tool.name());
    ensure_dir(&tool_dir)?;

    let succeeded = tool
        .run(&ToolRun {
            config,
            alignment_type: params.alignment_type,
            fasta_ref: &params.fasta_ref,
            sample_alignments: &params.sample_alignments,
            vcf_output_dir: &tool_dir,
            vcf_output_filename: &output,
        })
        .await?;
    if !succeeded {
        tracing::warn!("{} did not write a complete VCF to {}", tool, output.display());
        return Ok(false);
    }

    let mut dataset = register(group, tool.vcf_dataset_type(), &output);
    store.save(group)?;

    if tool == VariantTool::Freebayes && group.reference_genome.is_annotated {
        match downstream.annotate(group, &output)? {
            Some(annotated) => {
                dataset = register(group, DatasetType::VcfFreebayesSnpeff, &annotated);
                store.save(group)?;
            }
            None => tracing::warn!("annotation wrote no VCF, using {}", &dataset.label),
        }
    }

    downstream.index_and_track(group, &dataset)?;
    downstream.persist_variants(group, &dataset)?;
    for sample_alignment in &group.sample_alignments {
        if let Some(bed) = sample_alignment.dataset(DatasetType::BedCallableLoci) {
            downstream.flag_from_bed(sample_alignment, bed, &dataset)?;
        }
    }

    Ok(true)
}

/// Run `tools` in order; a failing tool does not stop the others.
///
/// The group ends up `Completed` if all tools succeeded and `Failed`
/// otherwise.
pub async fn call_variants(
    group: &mut AlignmentGroup,
    tools: &[VariantTool],
    config: &Config,
    store: &mut dyn GroupStore,
    downstream: &mut dyn Downstream,
) -> Result<Vec<ToolReport>, Error> {
    group.set_status(AlignmentGroupStatus::VariantCalling)?;

    let mut reports = Vec::new();
    for &tool in tools {
        let outcome = find_variants_with_tool(group, tool, config, store, downstream).await;
        let report = match outcome {
            Ok(true) => ToolReport {
                tool,
                succeeded: true,
                path: group
                    .dataset(tool.vcf_dataset_type())
                    .map(|ds| ds.path.clone()),
                error: None,
            },
            Ok(false) => ToolReport {
                tool,
                succeeded: false,
                path: None,
                error: Some("no complete VCF written".into()),
            },
            Err(e) => {
                tracing::error!("{} failed: {}", tool, e);
                ToolReport {
                    tool,
                    succeeded: false,
                    path: None,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }

    let status = if reports.iter().all(|report| report.succeeded) {
        AlignmentGroupStatus::Completed
    } else {
        AlignmentGroupStatus::Failed
    };
    group.set_status(status)?;
    store.save(group)?;

    Ok(reports)
}

/// Command line arguments for `call` sub command.
#[derive(Parser, Debug)]
#[command(about = "Run variant callers on an alignment group", long_about = None)]
pub struct Args {
    /// Path to the alignment group manifest (JSON), updated in place.
    #[arg(long)]
    pub path_group: PathBuf,
    /// Callers to run, in order; all callers if not given.
    #[arg(long, value_enum, value_delimiter = ',')]
    pub tool: Vec<VariantTool>,
    /// Path to the configuration file (TOML).
    #[arg(long)]
    pub path_config: Option<PathBuf>,
    /// Directory with the caller binaries, overrides the configuration.
    #[arg(long)]
    pub tools_dir: Option<String>,
    /// Optional path to write the per-tool reports to (JSON).
    #[arg(long)]
    pub path_report: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn call_variants_blocking(
    group: &mut AlignmentGroup,
    tools: &[VariantTool],
    config: &Config,
    store: &mut dyn GroupStore,
) -> Result<Vec<ToolReport>, Error> {
    call_variants(group, tools, config, store, &mut LocalDownstream).await
}

/// Main entry point for `call` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = std::time::Instant::now();
    tracing::info!("variant-calling-worker {}", worker_version());
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let config = Config::load(args.path_config.as_deref(), args.tools_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("could not load configuration: {}", e))?;
    tracing::debug!("config = {:#?}", &config);

    let mut store = JsonGroupStore::new(&args.path_group);
    let mut group = store.load().map_err(|e| {
        anyhow::anyhow!(
            "could not load alignment group from {}: {}",
            store.path().display(),
            e
        )
    })?;

    let tools = if args.tool.is_empty() {
        VariantTool::iter().collect::<Vec<_>>()
    } else {
        args.tool.clone()
    };

    tracing::info!("calling variants for {} with {:?}", &group.uid, &tools);
    let reports = call_variants_blocking(&mut group, &tools, &config, &mut store)?;
    for report in &reports {
        match (&report.path, &report.error) {
            (Some(path), _) => tracing::info!("{}: {}", report.tool, path.display()),
            (None, Some(error)) => tracing::warn!("{}: {}", report.tool, error),
            (None, None) => tracing::warn!("{}: failed", report.tool),
        }
    }

    if let Some(path_report) = &args.path_report {
        write_atomically(path_report, |writer| {
            serde_json::to_writer_pretty(&mut *writer, &reports)?;
            writeln!(writer)?;
            Ok(())
        })?;
    }

    tracing::info!(
        "All of `call` completed in {:?}",
        before_anything.elapsed()
    );
    let failed = reports.iter().filter(|report| !report.succeeded).count();
    if failed > 0 {
        anyhow::bail!("{} of {} tool(s) failed", failed, reports.len());
    }
    Ok(())
}

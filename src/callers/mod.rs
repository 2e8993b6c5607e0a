//! Adapters for the external variant callers.
//!
//! Every adapter shares the same contract: given the reference, the usable
//! sample alignments, and an output location, write a VCF file to
//! `vcf_output_filename` and report whether it is a complete result.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::conf::Config;
use crate::err::Error;
use crate::model::{DatasetType, SampleAlignment};

pub mod breakend;
pub mod delly;
pub mod freebayes;
pub mod lumpy;
pub mod pindel;

/// Inputs of one caller invocation.
#[derive(Debug, Clone, Copy)]
pub struct ToolRun<'a> {
    pub config: &'a Config,
    /// Dataset type of the alignments in `sample_alignments`.
    pub alignment_type: DatasetType,
    pub fasta_ref: &'a Path,
    pub sample_alignments: &'a [SampleAlignment],
    /// Per-tool directory for intermediate files.
    pub vcf_output_dir: &'a Path,
    pub vcf_output_filename: &'a Path,
}

/// The supported callers.
#[derive(
    clap::ValueEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Clone,
    Copy,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VariantTool {
    /// SNP and small indel calling.
    Freebayes,
    /// Structural variants from a per-sample configuration file.
    Pindel,
    /// Structural variants by rearrangement class.
    Delly,
    /// Structural variants from discordant pairs and split reads.
    Lumpy,
}

impl VariantTool {
    /// Name of the tool, also used for its output directory.
    pub fn name(&self) -> &'static str {
        match self {
            VariantTool::Freebayes => "freebayes",
            VariantTool::Pindel => "pindel",
            VariantTool::Delly => "delly",
            VariantTool::Lumpy => "lumpy",
        }
    }

    /// Type of the dataset registered for the tool's output.
    pub fn vcf_dataset_type(&self) -> DatasetType {
        match self {
            VariantTool::Freebayes => DatasetType::VcfFreebayes,
            VariantTool::Pindel => DatasetType::VcfPindel,
            VariantTool::Delly => DatasetType::VcfDelly,
            VariantTool::Lumpy => DatasetType::VcfLumpy,
        }
    }

    /// Run the tool; `Ok(true)` means that a complete VCF was written.
    pub async fn run(&self, run: &ToolRun<'_>) -> Result<bool, Error> {
        tracing::info!(
            "running {} on {} sample(s)",
            self,
            run.sample_alignments.len()
        );
        match self {
            VariantTool::Freebayes => freebayes::run(run).await,
            VariantTool::Pindel => pindel::run(run).await,
            VariantTool::Delly => delly::run(run).await,
            VariantTool::Lumpy => lumpy::run(run).await,
        }
    }
}

/// Strip the `.vcf` extension from `path`, giving the root shared by
/// intermediate files.
pub fn vcf_root(path: &Path) -> Result<PathBuf, Error> {
    path.to_str()
        .and_then(|s| s.strip_suffix(".vcf"))
        .map(PathBuf::from)
        .ok_or_else(|| {
            Error::Configuration(format!(
                "output file {} does not have a .vcf extension",
                path.display()
            ))
        })
}

/// Whether `path` holds VCF output, i.e., starts with a `##fileformat` line.
pub fn is_vcf_output(path: &Path) -> bool {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };
    let mut first_line = String::new();
    match std::io::BufReader::new(file).read_line(&mut first_line) {
        Ok(_) => first_line.starts_with("##fileformat=VCF"),
        Err(_) => false,
    }
}

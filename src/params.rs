//! Resolution of the inputs common to all callers.

use std::path::PathBuf;

use crate::common::{ensure_dir, io::is_non_empty_file};
use crate::err::Error;
use crate::model::{AlignmentGroup, DatasetStatus, DatasetType, SampleAlignment};

/// Inputs shared by all callers.
#[derive(Debug, Clone)]
pub struct CommonToolParams {
    /// Dataset type of the alignments fed into the callers.
    pub alignment_type: DatasetType,
    /// Path to the reference FASTA file.
    pub fasta_ref: PathBuf,
    /// The `vcf` directory of the alignment group.
    pub output_dir: PathBuf,
    /// Sample alignments with a usable alignment file.
    pub sample_alignments: Vec<SampleAlignment>,
}

/// Why a sample alignment was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SkipReason {
    #[strum(serialize = "no alignment dataset")]
    MissingDataset,
    #[strum(serialize = "alignment not ready")]
    NotReady,
    #[strum(serialize = "alignment file missing or empty")]
    EmptyFile,
}

/// Result of sample alignment validation.
#[derive(Debug, Clone)]
pub struct ValidatedSamples {
    pub usable: Vec<SampleAlignment>,
    /// Skipped samples by identifier, for the caller to report.
    pub skipped: Vec<(String, SkipReason)>,
}

/// Keep the sample alignments whose `alignment_type` dataset is ready and
/// backed by a non-empty file.
///
/// Fails with `Error::NoValidInput` if none remains.
pub fn find_valid_sample_alignments(
    group: &AlignmentGroup,
    alignment_type: DatasetType,
) -> Result<ValidatedSamples, Error> {
    let mut usable = Vec::new();
    let mut skipped = Vec::new();
    for sample_alignment in &group.sample_alignments {
        let reason = match sample_alignment.dataset(alignment_type) {
            None => Some(SkipReason::MissingDataset),
            Some(ds) if ds.status != DatasetStatus::Ready => Some(SkipReason::NotReady),
            Some(ds) if !is_non_empty_file(&ds.path) => Some(SkipReason::EmptyFile),
            Some(_) => None,
        };
        match reason {
            Some(reason) => skipped.push((sample_alignment.sample_uid.clone(), reason)),
            None => usable.push(sample_alignment.clone()),
        }
    }

    if usable.is_empty() {
        return Err(Error::NoValidInput(format!(
            "no successful {} alignments in alignment group {}",
            alignment_type, group.uid
        )));
    }
    Ok(ValidatedSamples { usable, skipped })
}

/// Assemble reference, output directory, and usable samples for `group`.
///
/// The output directory is created if necessary.
pub fn get_common_tool_params(
    group: &AlignmentGroup,
    alignment_type: DatasetType,
) -> Result<(CommonToolParams, Vec<(String, SkipReason)>), Error> {
    let fasta_ref = group
        .reference_genome
        .dataset(DatasetType::ReferenceGenomeFasta)
        .map(|ds| ds.path.clone())
        .ok_or_else(|| {
            Error::Configuration(format!(
                "reference genome {} has no FASTA dataset",
                group.reference_genome.uid
            ))
        })?;

    let output_dir = group.vcf_dir();
    ensure_dir(&output_dir)?;

    let ValidatedSamples { usable, skipped } =
        find_valid_sample_alignments(group, alignment_type)?;

    Ok((
        CommonToolParams {
            alignment_type,
            fasta_ref,
            output_dir,
            sample_alignments: usable,
        },
        skipped,
    ))
}

/// Paths of the `dataset_type` datasets of `sample_alignments`, in order.
pub fn dataset_paths(
    sample_alignments: &[SampleAlignment],
    dataset_type: DatasetType,
) -> Result<Vec<PathBuf>, Error> {
    sample_alignments
        .iter()
        .map(|sa| {
            sa.dataset(dataset_type)
                .map(|ds| ds.path.clone())
                .ok_or_else(|| {
                    Error::NoValidInput(format!(
                        "sample {} has no {} dataset",
                        sa.sample_uid, dataset_type
                    ))
                })
        })
        .collect()
}

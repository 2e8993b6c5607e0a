//! Alignment groups, sample alignments, and their datasets.
//!
//! These mirror the records owned by the persistence layer.  The calling
//! pipeline only mutates the group status and the group's dataset list.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::err::Error;

/// Type of a dataset; the `Display` value is the human readable label.
#[derive(
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
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    #[strum(serialize = "BWA BAM")]
    BwaAlign,
    #[strum(serialize = "BWA BAM Discordant Paired Reads")]
    BwaDiscordant,
    #[strum(serialize = "BWA BAM Split Reads")]
    BwaSplitters,
    #[strum(serialize = "Callable Loci BED")]
    BedCallableLoci,
    #[strum(serialize = "Reference Genome FASTA")]
    ReferenceGenomeFasta,
    #[strum(serialize = "Freebayes VCF")]
    VcfFreebayes,
    #[strum(serialize = "Freebayes VCF SnpEff Annotated")]
    VcfFreebayesSnpeff,
    #[strum(serialize = "Pindel VCF")]
    VcfPindel,
    #[strum(serialize = "Delly VCF")]
    VcfDelly,
    #[strum(serialize = "Lumpy VCF")]
    VcfLumpy,
}

/// Readiness of a dataset.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    #[default]
    Pending,
    Ready,
    Failed,
}

/// A typed, located file.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Dataset {
    pub dataset_type: DatasetType,
    pub label: String,
    pub path: PathBuf,
    #[serde(default)]
    pub status: DatasetStatus,
}

impl Dataset {
    /// A ready dataset of the given type, labelled with the type's label.
    pub fn ready(dataset_type: DatasetType, path: impl Into<PathBuf>) -> Self {
        Self {
            dataset_type,
            label: dataset_type.to_string(),
            path: path.into(),
            status: DatasetStatus::Ready,
        }
    }
}

/// Find the dataset of type `dataset_type` in `datasets`.
fn dataset_with_type(datasets: &[Dataset], dataset_type: DatasetType) -> Option<&Dataset> {
    datasets.iter().find(|ds| ds.dataset_type == dataset_type)
}

/// Insert size statistics of a paired-end library.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
pub struct InsertSize {
    pub mean: f64,
    pub stdev: f64,
}

/// The alignment of one sample within a group.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct SampleAlignment {
    /// Identifier of the aligned sample.
    pub sample_uid: String,
    /// Directory holding per-sample derived data, e.g. insert size histograms.
    pub data_dir: PathBuf,
    /// Insert size estimate; a negative mean marks it as undeterminable.
    #[serde(default)]
    pub insert_size: Option<InsertSize>,
    #[serde(default)]
    pub read_length: Option<u32>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

impl SampleAlignment {
    pub fn dataset(&self, dataset_type: DatasetType) -> Option<&Dataset> {
        dataset_with_type(&self.datasets, dataset_type)
    }

    /// The insert size if it could be determined.
    pub fn usable_insert_size(&self) -> Option<InsertSize> {
        self.insert_size.filter(|size| size.mean >= 0.0)
    }

    /// Path of the insert size histogram next to the sample's data.
    pub fn insert_size_histogram(&self) -> PathBuf {
        self.data_dir.join("insert_size_histogram.txt")
    }
}

/// The reference genome that the group was aligned against.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct ReferenceGenome {
    pub uid: String,
    /// Whether a gene annotation is available for effect prediction.
    #[serde(default)]
    pub is_annotated: bool,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

impl ReferenceGenome {
    pub fn dataset(&self, dataset_type: DatasetType) -> Option<&Dataset> {
        dataset_with_type(&self.datasets, dataset_type)
    }
}

/// Lifecycle of an alignment group.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentGroupStatus {
    #[default]
    Aligning,
    VariantCalling,
    Completed,
    Failed,
}

impl AlignmentGroupStatus {
    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Status only moves forward; a finished group may re-enter calling.
    pub fn can_transition_to(self, next: AlignmentGroupStatus) -> bool {
        use AlignmentGroupStatus::*;
        match (self, next) {
            (_, Aligning) => self == Aligning,
            (_, VariantCalling) => true,
            (VariantCalling, Completed | Failed) => true,
            (Completed, Completed) | (Failed, Failed) => true,
            _ => false,
        }
    }
}

/// A cohort of sample alignments against one reference.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct AlignmentGroup {
    pub uid: String,
    /// Base directory for data derived from this group.
    pub data_dir: PathBuf,
    #[serde(default)]
    pub status: AlignmentGroupStatus,
    pub reference_genome: ReferenceGenome,
    #[serde(default)]
    pub sample_alignments: Vec<SampleAlignment>,
    /// Datasets produced for the group as a whole.
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

impl AlignmentGroup {
    pub fn dataset(&self, dataset_type: DatasetType) -> Option<&Dataset> {
        dataset_with_type(&self.datasets, dataset_type)
    }

    /// Move to `status`, rejecting backward transitions.
    pub fn set_status(&mut self, status: AlignmentGroupStatus) -> Result<(), Error> {
        if !self.status.can_transition_to(status) {
            return Err(Error::Configuration(format!(
                "alignment group {} cannot move from {:?} to {:?}",
                self.uid, self.status, status
            )));
        }
        self.status = status;
        Ok(())
    }

    /// Register `dataset`, replacing any previous dataset of the same type.
    ///
    /// Returns the replaced dataset, if any.
    pub fn supersede_dataset(&mut self, dataset: Dataset) -> Option<Dataset> {
        let previous = self
            .datasets
            .iter()
            .position(|ds| ds.dataset_type == dataset.dataset_type)
            .map(|idx| self.datasets.remove(idx));
        self.datasets.push(dataset);
        previous
    }

    /// Identifiers of all samples in the group, in group order.
    pub fn sample_uids(&self) -> Vec<String> {
        self.sample_alignments
            .iter()
            .map(|sa| sa.sample_uid.clone())
            .collect()
    }

    /// Directory that receives the output of all callers.
    pub fn vcf_dir(&self) -> PathBuf {
        self.data_dir.join("vcf")
    }
}

/// Persistence of alignment groups.
pub trait GroupStore {
    /// Persist the current state of `group`.
    fn save(&mut self, group: &AlignmentGroup) -> Result<(), Error>;
}

/// Keeps the group as a JSON manifest on disk.
#[derive(Debug, Clone)]
pub struct JsonGroupStore {
    path: PathBuf,
}

impl JsonGroupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the group from the manifest.
    pub fn load(&self) -> Result<AlignmentGroup, Error> {
        let reader = crate::common::io::open_read_maybe_gz(&self.path)?;
        Ok(serde_json::from_reader(reader)?)
    }
}

impl GroupStore for JsonGroupStore {
    fn save(&mut self, group: &AlignmentGroup) -> Result<(), Error> {
        crate::common::io::write_atomically(&self.path, |w| {
            serde_json::to_writer_pretty(&mut *w, group)?;
            writeln!(w)?;
            Ok(())
        })
    }
}

/// Keeps every saved state in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryGroupStore {
    pub saved: Vec<AlignmentGroup>,
}

impl GroupStore for MemoryGroupStore {
    fn save(&mut self, group: &AlignmentGroup) -> Result<(), Error> {
        self.saved.push(group.clone());
        Ok(())
    }
}

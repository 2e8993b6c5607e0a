//! Collaborators that consume a registered variant dataset.

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thousands::Separable;

use crate::common::io::{open_read_maybe_gz, write_atomically};
use crate::common::noodles::read_vcf;
use crate::err::Error;
use crate::model::{AlignmentGroup, Dataset, SampleAlignment};
use crate::record::VariantRecord;

/// Steps run after a caller's VCF has been registered.
pub trait Downstream {
    /// Annotate variant effects in `vcf`, returning the annotated VCF if one
    /// was written.
    fn annotate(&mut self, group: &AlignmentGroup, vcf: &Path) -> Result<Option<PathBuf>, Error>;

    /// Index `dataset` and make it available as a browser track.
    fn index_and_track(&mut self, group: &AlignmentGroup, dataset: &Dataset) -> Result<(), Error>;

    /// Parse and persist the records of `dataset`; returns the record count.
    fn persist_variants(
        &mut self,
        group: &AlignmentGroup,
        dataset: &Dataset,
    ) -> Result<usize, Error>;

    /// Flag the records of `dataset` that fall into the regions of `bed`;
    /// returns the number of flagged records.
    fn flag_from_bed(
        &mut self,
        sample_alignment: &SampleAlignment,
        bed: &Dataset,
        dataset: &Dataset,
    ) -> Result<usize, Error>;
}

/// `path` with `suffix` appended to the file name.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut result = path.as_os_str().to_owned();
    result.push(suffix);
    PathBuf::from(result)
}

/// Path of the JSON lines file written by `persist_variants`.
pub fn records_path(vcf: &Path) -> PathBuf {
    with_suffix(vcf, ".records.jsonl")
}

/// Path of the file written by `flag_from_bed` for `sample_uid`.
pub fn callable_path(vcf: &Path, sample_uid: &str) -> PathBuf {
    vcf.parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}.callable.tsv", sample_uid))
}

/// Half-open, 0-based intervals by chromosome.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Regions {
    by_chrom: IndexMap<String, Vec<(u64, u64)>>,
}

impl Regions {
    /// Load the regions from the BED file at `path`.
    pub fn from_bed<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(open_read_maybe_gz(path.as_ref())?);

        let mut result = Self::default();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let chrom = record.get(0).unwrap_or_default();
            if chrom.starts_with("track") || chrom.starts_with("browser") {
                continue;
            }
            let bound = |idx: usize| {
                record
                    .get(idx)
                    .and_then(|value| value.parse::<u64>().ok())
                    .ok_or_else(|| {
                        Error::malformed("BED line", format!("line {}: {:?}", i + 1, record))
                    })
            };
            let (start, end) = (bound(1)?, bound(2)?);
            result
                .by_chrom
                .entry(chrom.to_string())
                .or_default()
                .push((start, end));
        }
        Ok(result)
    }

    /// Whether the 1-based position `pos` on `chrom` lies in a region.
    pub fn contains(&self, chrom: &str, pos: u64) -> bool {
        let pos0 = match pos.checked_sub(1) {
            Some(pos0) => pos0,
            None => return false,
        };
        self.by_chrom
            .get(chrom)
            .map(|intervals| {
                intervals
                    .iter()
                    .any(|(start, end)| *start <= pos0 && pos0 < *end)
            })
            .unwrap_or(false)
    }
}

/// Read all records of the VCF at `path`.
fn read_records(path: &Path) -> Result<Vec<VariantRecord>, Error> {
    let (header, records) = read_vcf(path)?;
    Ok(records
        .iter()
        .map(|record| VariantRecord::from_vcf(record, &header))
        .collect())
}

/// File-based implementation that ships with the worker.
///
/// No annotation or genome browser backend is bundled; these steps only log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDownstream;

impl Downstream for LocalDownstream {
    fn annotate(&mut self, group: &AlignmentGroup, vcf: &Path) -> Result<Option<PathBuf>, Error> {
        tracing::info!(
            "no annotation backend configured, leaving {} of {} unannotated",
            vcf.display(),
            &group.uid
        );
        Ok(None)
    }

    fn index_and_track(&mut self, group: &AlignmentGroup, dataset: &Dataset) -> Result<(), Error> {
        tracing::info!(
            "no track backend configured, not indexing {} ({}) of {}",
            dataset.path.display(),
            &dataset.label,
            &group.uid
        );
        Ok(())
    }

    fn persist_variants(
        &mut self,
        group: &AlignmentGroup,
        dataset: &Dataset,
    ) -> Result<usize, Error> {
        let mut records = read_records(&dataset.path)?;
        let samples = group.sample_uids();
        let out_path = records_path(&dataset.path);

        write_atomically(&out_path, |writer: &mut dyn Write| {
            for record in records.iter_mut() {
                record.fill_missing_samples(&samples);
                serde_json::to_writer(&mut *writer, record)?;
                writeln!(writer)?;
            }
            Ok(())
        })?;

        tracing::info!(
            "persisted {} records to {}",
            records.len().separate_with_commas(),
            out_path.display()
        );
        Ok(records.len())
    }

    fn flag_from_bed(
        &mut self,
        sample_alignment: &SampleAlignment,
        bed: &Dataset,
        dataset: &Dataset,
    ) -> Result<usize, Error> {
        let regions = Regions::from_bed(&bed.path)?;
        let records = read_records(&dataset.path)?;
        let out_path = callable_path(&dataset.path, &sample_alignment.sample_uid);

        let mut flagged = 0;
        write_atomically(&out_path, |writer: &mut dyn Write| {
            for record in records
                .iter()
                .filter(|record| regions.contains(&record.chrom, record.pos))
            {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}",
                    &record.chrom, record.pos, &record.ref_allele, &record.alt_allele
                )?;
                flagged += 1;
            }
            Ok(())
        })?;

        tracing::debug!(
            "flagged {} of {} records for {}",
            flagged.separate_with_commas(),
            records.len().separate_with_commas(),
            &sample_alignment.sample_uid
        );
        Ok(flagged)
    }
}

//! Structural variant calling with delly, one run per rearrangement class.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use strum::IntoEnumIterator;

use super::{is_vcf_output, pindel, vcf_root, ToolRun};
use crate::err::Error;
use crate::model::{DatasetType, SampleAlignment};
use crate::normalize::{postprocess_vcf, Flavor};
use crate::params::dataset_paths;
use crate::process::ToolCommand;

/// Rearrangement classes that delly is run for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum SvClass {
    Del,
    Dup,
    Inv,
}

/// What a run for one class left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassOutcome {
    /// The class VCF at the given path.
    Produced(PathBuf),
    /// No events of this class; delly exits non-zero in this case.
    Empty,
}

/// Path of the index file next to `path`.
fn index_path(path: &Path) -> PathBuf {
    let mut result: OsString = path.as_os_str().to_owned();
    result.push(".bai");
    PathBuf::from(result)
}

/// Intermediate files of one run; whatever exists of them is removed on drop.
#[derive(Debug, Default)]
struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!("could not remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Copies of the alignment files named after their sample.
///
/// delly takes the sample name from the file name.  Only the copies made
/// here are removed when this value is dropped; an existing file at a
/// copy's destination is an error.
#[derive(Debug, Default)]
struct SampleNamedAlignments {
    bam_files: Vec<PathBuf>,
    created: ScratchFiles,
}

impl SampleNamedAlignments {
    fn create(
        sample_alignments: &[SampleAlignment],
        alignment_type: DatasetType,
    ) -> Result<Self, Error> {
        let mut result = Self::default();
        let bam_files = dataset_paths(sample_alignments, alignment_type)?;
        for (sample_alignment, bam_file) in sample_alignments.iter().zip(bam_files) {
            let dir = bam_file.parent().unwrap_or_else(|| Path::new("."));
            let named = dir.join(format!("{}.bam", &sample_alignment.sample_uid));
            if named == bam_file {
                result.bam_files.push(bam_file);
                continue;
            }
            for (src, dst) in [
                (bam_file.clone(), named.clone()),
                (index_path(&bam_file), index_path(&named)),
            ] {
                if dst.exists() {
                    return Err(Error::Configuration(format!(
                        "cannot name alignments of {} for delly, {} already exists",
                        &sample_alignment.sample_uid,
                        dst.display()
                    )));
                }
                result.created.track(dst.clone());
                std::fs::copy(&src, &dst)?;
            }
            result.bam_files.push(named);
        }
        Ok(result)
    }
}

/// Output file of the run for `class`, e.g., `BWA_BAM_DEL.vcf`.
fn class_output(root: &Path, class: SvClass) -> PathBuf {
    let mut result = root.as_os_str().to_owned();
    result.push(format!("_{}.vcf", class));
    PathBuf::from(result)
}

/// Run delly for `class` writing to `output`, tolerating a non-zero exit.
async fn call_class(
    run: &ToolRun<'_>,
    delly: &Path,
    output: &Path,
    class: SvClass,
    bam_files: &[PathBuf],
) -> Result<ClassOutcome, Error> {
    // delly leaves no file for an empty class
    if output.exists() {
        tracing::debug!("removing stale {}", output.display());
        std::fs::remove_file(output)?;
    }

    let outcome = ToolCommand::new(delly)
        .arg("-t")
        .arg(class.to_string())
        .arg("-o")
        .arg(output)
        .arg("-g")
        .arg(run.fasta_ref)
        .args(bam_files)
        .timeout(run.config.tools.timeout())
        .run()
        .await?;
    if !outcome.success() {
        tracing::warn!(
            "delly exited with {} for {}: {}",
            outcome.status,
            class,
            outcome.stderr_lossy()
        );
    }

    if output.exists() {
        Ok(ClassOutcome::Produced(output.to_path_buf()))
    } else {
        tracing::info!("no {} events found", class);
        Ok(ClassOutcome::Empty)
    }
}

/// Run delly for all classes, merge, and normalize the result.
pub async fn run(run: &ToolRun<'_>) -> Result<bool, Error> {
    let tools = &run.config.tools;
    let delly = tools.require_binary("delly", "delly")?;
    tools.require_binary("pindel", "pindel2vcf")?;
    let root = vcf_root(run.vcf_output_filename)?;
    let mut scratch = ScratchFiles::default();

    let alignments = SampleNamedAlignments::create(run.sample_alignments, run.alignment_type)?;
    let mut class_vcfs = Vec::new();
    for class in SvClass::iter() {
        let output = class_output(&root, class);
        scratch.track(output.clone());
        if let ClassOutcome::Produced(path) =
            call_class(run, &delly, &output, class, &alignments.bam_files).await?
        {
            class_vcfs.push(path);
        }
    }
    drop(alignments);

    if class_vcfs.is_empty() {
        // the converter turns an empty pindel output into a header-only VCF
        scratch.track(root.clone());
        std::fs::File::create(&root)?;
        pindel::converter_command(run.config, "-p", &root, run.fasta_ref)?
            .run_checked()
            .await?;
    } else {
        let temp_vcf = run.vcf_output_dir.join("temp_vcf");
        scratch.track(temp_vcf.clone());
        ToolCommand::new(&tools.vcf_concat)
            .args(&class_vcfs)
            .stdout_to(&temp_vcf)
            .timeout(tools.timeout())
            .run_checked()
            .await?;
        ToolCommand::new(&tools.vcf_sort)
            .arg(&temp_vcf)
            .stdout_to(run.vcf_output_filename)
            .timeout(tools.timeout())
            .run_checked()
            .await?;
    }
    drop(scratch);

    postprocess_vcf(run.vcf_output_filename, Flavor::Delly)?;

    Ok(is_vcf_output(run.vcf_output_filename))
}

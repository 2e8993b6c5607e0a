//! Structural variant calling with lumpy from discordant pairs and split reads.

use std::path::PathBuf;

use super::breakend::{report_to_vcf, SampleIndex};
use super::{is_vcf_output, vcf_root, ToolRun};
use crate::conf::LumpyConf;
use crate::err::Error;
use crate::model::{Dataset, DatasetStatus, DatasetType, SampleAlignment};
use crate::process::ToolCommand;

/// Path of a dataset that lumpy may use, i.e., one that did not fail.
fn usable_path(dataset: Option<&Dataset>) -> Option<&PathBuf> {
    dataset
        .filter(|ds| ds.status != DatasetStatus::Failed && !ds.path.as_os_str().is_empty())
        .map(|ds| &ds.path)
}

/// Paired-end evidence options for sample `id`.
fn pe_option(conf: &LumpyConf, id: usize, sample_alignment: &SampleAlignment) -> Option<String> {
    let bam_file = usable_path(sample_alignment.dataset(DatasetType::BwaDiscordant))?;
    let (insert_size, read_length) = match (
        sample_alignment.usable_insert_size(),
        sample_alignment.read_length,
    ) {
        (Some(insert_size), Some(read_length)) => (insert_size, read_length),
        _ => {
            tracing::warn!(
                "no insert size or read length for {}, not using discordant pairs",
                &sample_alignment.sample_uid
            );
            return None;
        }
    };
    let pe = &conf.paired_end;
    Some(
        [
            format!("bam_file:{}", bam_file.display()),
            format!(
                "histo_file:{}",
                sample_alignment.insert_size_histogram().display()
            ),
            format!("mean:{}", insert_size.mean),
            format!("stdev:{}", insert_size.stdev),
            format!("read_length:{}", read_length),
            format!("min_non_overlap:{}", read_length),
            format!("id:{}", id),
            format!("back_distance:{}", pe.back_distance),
            format!("weight:{}", pe.weight),
            format!("min_mapping_threshold:{}", pe.min_mapping_threshold),
            format!("discordant_z:{}", pe.discordant_z),
        ]
        .join(","),
    )
}

/// Split-read evidence options for sample `id`.
fn sr_option(conf: &LumpyConf, id: usize, sample_alignment: &SampleAlignment) -> Option<String> {
    let bam_file = usable_path(sample_alignment.dataset(DatasetType::BwaSplitters))?;
    let sr = &conf.split_read;
    Some(
        [
            format!("bam_file:{}", bam_file.display()),
            format!("id:{}", id),
            format!("back_distance:{}", sr.back_distance),
            format!("weight:{}", sr.weight),
            format!("min_mapping_threshold:{}", sr.min_mapping_threshold),
        ]
        .join(","),
    )
}

/// Build the lumpy arguments; sample ids are the positions in `samples`.
fn build_args(
    conf: &LumpyConf,
    sample_alignments: &[SampleAlignment],
) -> Result<Vec<String>, Error> {
    let mut pe_args = Vec::new();
    let mut sr_args = Vec::new();
    for (id, sample_alignment) in sample_alignments.iter().enumerate() {
        if let Some(option) = pe_option(conf, id, sample_alignment) {
            pe_args.extend(["-pe".to_string(), option]);
        }
        if let Some(option) = sr_option(conf, id, sample_alignment) {
            sr_args.extend(["-sr".to_string(), option]);
        }
    }
    if pe_args.is_empty() && sr_args.is_empty() {
        return Err(Error::NoValidInput(
            "no discordant pair or split read alignments, lumpy cannot proceed".into(),
        ));
    }

    let mut args = vec![
        "-mw".to_string(),
        conf.min_weight.to_string(),
        "-tt".to_string(),
        conf.trim_threshold.to_string(),
    ];
    args.extend(pe_args);
    args.extend(sr_args);
    Ok(args)
}

/// Path of the raw lumpy report next to the output VCF.
pub fn report_path(vcf_output_filename: &std::path::Path) -> Result<PathBuf, Error> {
    let mut path = vcf_root(vcf_output_filename)?.into_os_string();
    path.push(".lumpy.txt");
    Ok(PathBuf::from(path))
}

/// Run lumpy and translate its report into the output VCF.
pub async fn run(run: &ToolRun<'_>) -> Result<bool, Error> {
    let lumpy = run.config.tools.require_binary("lumpy", "lumpy")?;
    let args = build_args(&run.config.lumpy, run.sample_alignments)?;
    let samples = SampleIndex::new(run.sample_alignments.iter().map(|sa| sa.sample_uid.clone()));
    let report = report_path(run.vcf_output_filename)?;

    ToolCommand::new(lumpy)
        .args(&args)
        .stdout_to(&report)
        .timeout(run.config.tools.timeout())
        .run_checked()
        .await?;

    report_to_vcf(&report, &samples, run.vcf_output_filename)?;

    Ok(is_vcf_output(run.vcf_output_filename))
}

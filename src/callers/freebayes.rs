//! SNP and small indel calling with freebayes.

use std::ffi::OsString;

use super::{is_vcf_output, ToolRun};
use crate::err::Error;
use crate::params::dataset_paths;
use crate::process::ToolCommand;

/// Build the freebayes command line for all samples at once.
fn build_command(run: &ToolRun<'_>) -> Result<ToolCommand, Error> {
    let conf = &run.config.freebayes;
    let binary = run.config.tools.require_binary("freebayes", "freebayes")?;

    let mut args: Vec<OsString> = Vec::new();
    for bam_file in dataset_paths(run.sample_alignments, run.alignment_type)? {
        args.push("--bam".into());
        args.push(bam_file.into_os_string());
    }
    args.push("--fasta-reference".into());
    args.push(run.fasta_ref.as_os_str().to_owned());

    Ok(ToolCommand::new(binary)
        .args(args)
        .args([
            "--pvar".to_string(),
            conf.pvar.to_string(),
            "--ploidy".to_string(),
            conf.ploidy.to_string(),
            "--min-alternate-fraction".to_string(),
            conf.min_alternate_fraction.to_string(),
            "--hwe-priors-off".to_string(),
            "--binomial-obs-priors-off".to_string(),
            "--use-mapping-quality".to_string(),
            "--min-base-quality".to_string(),
            conf.min_base_quality.to_string(),
            "--min-mapping-quality".to_string(),
            conf.min_mapping_quality.to_string(),
        ])
        .stdout_to(run.vcf_output_filename)
        .timeout(run.config.tools.timeout()))
}

/// Run freebayes, writing its standard output to the output VCF.
pub async fn run(run: &ToolRun<'_>) -> Result<bool, Error> {
    build_command(run)?.run_checked().await?;
    Ok(is_vcf_output(run.vcf_output_filename))
}

#[cfg(all(test, unix))]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::callers::test::{printf, test_config, EMPTY_VCF};
    use crate::model::{test::example_group, DatasetType};
    use crate::process::test::write_script;

    #[tokio::test]
    async fn run_passes_all_bams() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let config = test_config(&tmpdir);
        let group = example_group(&tmpdir, &["s1", "s2"]);
        let args_file = tmpdir.join("args.txt");
        write_script(
            &config.tools.binary("freebayes", "freebayes"),
            &format!("echo \"$@\" > {}\n{}", args_file.display(), printf(EMPTY_VCF)),
        )?;
        let out = tmpdir.join("BWA_BAM.vcf");

        let ok = run(&ToolRun {
            config: &config,
            alignment_type: DatasetType::BwaAlign,
            fasta_ref: &tmpdir.join("ref.fa"),
            sample_alignments: &group.sample_alignments,
            vcf_output_dir: &tmpdir,
            vcf_output_filename: &out,
        })
        .await?;

        assert!(ok);
        assert_eq!(std::fs::read_to_string(&out)?, EMPTY_VCF);
        assert_eq!(
            std::fs::read_to_string(&args_file)?.trim_end(),
            format!(
                "--bam {dir}/s1.bwa.bam --bam {dir}/s2.bwa.bam --fasta-reference {dir}/ref.fa \
                 --pvar 0.001 --ploidy 2 --min-alternate-fraction 0.3 --hwe-priors-off \
                 --binomial-obs-priors-off --use-mapping-quality --min-base-quality 25 \
                 --min-mapping-quality 30",
                dir = tmpdir.display()
            )
        );
        Ok(())
    }

    #[tokio::test]
    async fn failing_binary_propagates() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let config = test_config(&tmpdir);
        let group = example_group(&tmpdir, &["s1"]);
        write_script(&config.tools.binary("freebayes", "freebayes"), "exit 1")?;
        let out = tmpdir.join("BWA_BAM.vcf");

        let res = run(&ToolRun {
            config: &config,
            alignment_type: DatasetType::BwaAlign,
            fasta_ref: &tmpdir.join("ref.fa"),
            sample_alignments: &group.sample_alignments,
            vcf_output_dir: &tmpdir,
            vcf_output_filename: &out,
        })
        .await;

        assert!(matches!(res, Err(Error::ExternalProcess { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn missing_binary_is_configuration_error() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let config = test_config(&tmpdir);
        let group = example_group(&tmpdir, &["s1"]);
        let out = tmpdir.join("BWA_BAM.vcf");

        let res = run(&ToolRun {
            config: &config,
            alignment_type: DatasetType::BwaAlign,
            fasta_ref: &tmpdir.join("ref.fa"),
            sample_alignments: &group.sample_alignments,
            vcf_output_dir: &tmpdir,
            vcf_output_filename: &out,
        })
        .await;

        assert!(matches!(res, Err(Error::Configuration(_))));
        Ok(())
    }
}

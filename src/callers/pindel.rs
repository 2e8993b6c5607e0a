//! Structural variant calling with pindel.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{is_vcf_output, vcf_root, ToolRun};
use crate::conf::Config;
use crate::err::Error;
use crate::normalize::{postprocess_vcf, Flavor};
use crate::params::dataset_paths;
use crate::process::ToolCommand;

/// Name of the per-sample configuration file in the tool directory.
pub const CONFIG_FILE_NAME: &str = "pindel_config.txt";

/// Write the pindel configuration, one `<bam> <insert size> <sample>` line
/// per sample with a known insert size.
///
/// Returns the path of the file and the number of lines written.
fn write_config(run: &ToolRun<'_>) -> Result<(PathBuf, usize), Error> {
    let path = run.vcf_output_dir.join(CONFIG_FILE_NAME);
    let bam_files = dataset_paths(run.sample_alignments, run.alignment_type)?;

    let mut writer = BufWriter::new(std::fs::File::create(&path)?);
    let mut lines = 0;
    for (sample_alignment, bam_file) in run.sample_alignments.iter().zip(bam_files.iter()) {
        let insert_size = match sample_alignment.usable_insert_size() {
            Some(insert_size) => insert_size,
            None => {
                tracing::warn!(
                    "skipping sample {}: insert size could not be determined",
                    &sample_alignment.sample_uid
                );
                continue;
            }
        };
        writeln!(
            writer,
            "{} {:.0} {}",
            bam_file.display(),
            insert_size.mean,
            &sample_alignment.sample_uid
        )?;
        lines += 1;
    }
    writer.flush()?;

    Ok((path, lines))
}

/// Command converting the pindel output at `root` to `<root>.vcf`.
///
/// `input_flag` is `-P` for the output prefix of a pindel run and `-p` for a
/// single output file.
pub(super) fn converter_command(
    config: &Config,
    input_flag: &str,
    root: &Path,
    fasta_ref: &Path,
) -> Result<ToolCommand, Error> {
    let pindel2vcf = config.tools.require_binary("pindel", "pindel2vcf")?;
    Ok(ToolCommand::new(pindel2vcf)
        .arg(input_flag)
        .arg(root)
        .arg("-r")
        .arg(fasta_ref)
        .args(["-R", "name", "-d", "date"])
        .timeout(config.tools.timeout()))
}

/// Run pindel followed by its VCF converter and normalize the result.
pub async fn run(run: &ToolRun<'_>) -> Result<bool, Error> {
    let tools = &run.config.tools;
    let pindel = tools.require_binary("pindel", "pindel")?;
    tools.require_binary("pindel", "pindel2vcf")?;

    let (pindel_config, lines) = write_config(run)?;
    if lines == 0 {
        return Err(Error::NoValidInput(
            "no sample with a known insert size, pindel cannot proceed".into(),
        ));
    }
    tracing::debug!("wrote {} line(s) to {}", lines, pindel_config.display());

    let root = vcf_root(run.vcf_output_filename)?;
    ToolCommand::new(pindel)
        .arg("-f")
        .arg(run.fasta_ref)
        .arg("-i")
        .arg(&pindel_config)
        .args(["-c", "ALL", "-o"])
        .arg(&root)
        .timeout(tools.timeout())
        .run_checked()
        .await?;

    // one supporting read is enough for a 1/1 genotype
    converter_command(run.config, "-P", &root, run.fasta_ref)?
        .arg("-mc")
        .arg(run.config.pindel.min_supporting_reads.to_string())
        .run_checked()
        .await?;

    postprocess_vcf(
        run.vcf_output_filename,
        Flavor::Pindel {
            min_sv_length: run.config.pindel.min_sv_length,
        },
    )?;

    Ok(is_vcf_output(run.vcf_output_filename))
}

#[cfg(all(test, unix))]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::callers::test::test_config;
    use crate::model::{test::example_group, DatasetType, InsertSize};
    use crate::process::test::write_script;
    use crate::common::noodles::read_vcf;
    use crate::normalize::method_key;
    use crate::record::SvLen;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/vcf").join(name)
    }

    /// Stand-in tools: pindel logs its arguments, pindel2vcf copies the fixture.
    fn install_tools(config: &Config, log: &Path) -> Result<(), anyhow::Error> {
        write_script(
            &config.tools.binary("pindel", "pindel"),
            &format!("echo \"pindel $@\" >> {}", log.display()),
        )?;
        write_script(
            &config.tools.binary("pindel", "pindel2vcf"),
            &format!(
                "echo \"pindel2vcf $@\" >> {}\ncp {} \"$2.vcf\"",
                log.display(),
                fixture("pindel.vcf").display()
            ),
        )?;
        Ok(())
    }

    #[tokio::test]
    async fn run_writes_config_and_filters() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let config = test_config(&tmpdir);
        let log = tmpdir.join("calls.txt");
        install_tools(&config, &log)?;
        let mut group = example_group(&tmpdir, &["s1", "s2", "s3"]);
        group.sample_alignments[1].insert_size = Some(InsertSize {
            mean: -1.0,
            stdev: 0.0,
        });
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
        let dir = tmpdir.display();
        assert_eq!(
            std::fs::read_to_string(tmpdir.join(CONFIG_FILE_NAME))?,
            format!("{dir}/s1.bwa.bam 300 s1\n{dir}/s3.bwa.bam 300 s3\n")
        );
        assert_eq!(
            std::fs::read_to_string(&log)?,
            format!(
                "pindel -f {dir}/ref.fa -i {dir}/{CONFIG_FILE_NAME} -c ALL -o {dir}/BWA_BAM\n\
                 pindel2vcf -P {dir}/BWA_BAM -r {dir}/ref.fa -R name -d date -mc 1\n"
            )
        );

        let (header, records) = read_vcf(&out)?;
        assert!(header.infos().contains_key(&method_key()?));
        let lengths = records
            .iter()
            .map(|record| SvLen::from_info(record.info()))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(
            lengths,
            vec![Some(SvLen::Length(25)), Some(SvLen::Length(10))]
        );
        Ok(())
    }

    #[tokio::test]
    async fn no_insert_sizes_is_no_valid_input() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let config = test_config(&tmpdir);
        let log = tmpdir.join("calls.txt");
        install_tools(&config, &log)?;
        let mut group = example_group(&tmpdir, &["s1"]);
        group.sample_alignments[0].insert_size = None;
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

        assert!(matches!(res, Err(Error::NoValidInput(_))));
        assert!(!log.exists());
        Ok(())
    }

    #[tokio::test]
    async fn converter_failure_propagates() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let config = test_config(&tmpdir);
        write_script(&config.tools.binary("pindel", "pindel"), "exit 0")?;
        write_script(
            &config.tools.binary("pindel", "pindel2vcf"),
            "echo 'reference not found' >&2; exit 2",
        )?;
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

        match res {
            Err(Error::ExternalProcess { stderr, .. }) => {
                assert_eq!(stderr, "reference not found")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        Ok(())
    }
}

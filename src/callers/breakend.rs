//! Translation of lumpy breakend reports into VCF.
//!
//! lumpy writes one tab-separated line per candidate variant with two
//! breakpoint intervals, an evidence score, strands, a type tag such as
//! `TYPE:DELETION`, the supporting samples as `IDS:<id>,<reads>;...`, and the
//! most probable breakpoint positions as `MAX:<chr>:<pos>;<chr>:<pos>`.
//! Samples are referred to by integer ids that are assigned when building
//! the lumpy command line.

use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use noodles_vcf as vcf;
use serde::Deserialize;
use thousands::Separable;
use vcf::header::record::value::{
    map::{format, info, AlternativeAllele, Format, Info},
    Map,
};
use vcf::header::{FileFormat, Number};
use vcf::record::genotypes::{keys::key as format_key, sample::Value as SampleValue, Keys};
use vcf::record::info::field::{key as info_key, Value};
use vcf::record::{
    AlternateBases, Chromosome, Genotypes, Position, QualityScore, ReferenceBases,
};

use crate::common::io::{open_read_maybe_gz, write_atomically};
use crate::common::noodles::parse_key;
use crate::err::Error;
use crate::normalize::method_key;
use crate::record::SvLen;

/// Value of the `METHOD` INFO field.
pub const METHOD: &str = "LUMPY";

/// Genotype written for samples with evidence.
const HOM_ALT: &str = "1/1";

/// Bidirectional mapping between lumpy's integer sample ids and sample
/// identifiers; the id is the position in invocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleIndex {
    uids: IndexSet<String>,
}

impl SampleIndex {
    pub fn new<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uids: uids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn uid(&self, id: usize) -> Option<&str> {
        self.uids.get_index(id).map(String::as_str)
    }

    /// Sample identifiers in id order.
    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.uids.iter().map(String::as_str)
    }
}

/// One line of the lumpy report.
#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
struct ReportLine {
    chr_1: String,
    ivl_1_start: u64,
    ivl_1_end: u64,
    chr_2: String,
    ivl_2_start: u64,
    ivl_2_end: u64,
    id: String,
    evidence_score: String,
    strand_1: String,
    strand_2: String,
    svtype: String,
    sample_ids: String,
    strand_configs: String,
    breakpoint_max: String,
    breakpoint_95_reg: String,
}

/// A translated breakend call.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakendCall {
    pub chrom: String,
    pub pos: u64,
    /// Three letter type, e.g. `DEL`.
    pub svtype: String,
    pub score: String,
    pub end_chrom: String,
    pub end: u64,
    pub strand_1: String,
    pub strand_2: String,
    pub svlen: SvLen,
    /// Supporting reads per sample in index order; `None` if not observed.
    pub reads: IndexMap<String, Option<u64>>,
}

/// Convert a number into an INFO or FORMAT integer.
fn to_i32(what: &'static str, value: u64) -> Result<i32, Error> {
    i32::try_from(value).map_err(|e| Error::malformed(what, format!("{}: {}", value, e)))
}

/// Parse one of the record columns.
fn parse_column<T>(value: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::malformed("breakend record", format!("{}: {}", value, e)))
}

impl BreakendCall {
    /// Combined depth over all samples.
    pub fn depth(&self) -> u64 {
        self.reads.values().flatten().sum()
    }

    /// The VCF record for this call.
    pub fn to_vcf_record(&self) -> Result<vcf::Record, Error> {
        let mut info = vcf::record::Info::default();
        info.insert(info_key::IS_IMPRECISE, Some(Value::Flag));
        info.insert(info_key::SV_TYPE, Some(Value::String(self.svtype.clone())));
        info.insert(info_key::END_POSITION, Some(Value::Integer(to_i32("END", self.end)?)));
        info.insert(parse_key("END_CHR")?, Some(Value::String(self.end_chrom.clone())));
        info.insert(parse_key("STRAND_1")?, Some(Value::String(self.strand_1.clone())));
        info.insert(parse_key("STRAND_2")?, Some(Value::String(self.strand_2.clone())));
        info.insert(info_key::SV_LENGTHS, Some(self.svlen.to_value()?));
        info.insert(method_key()?, Some(Value::String(METHOD.to_string())));
        info.insert(parse_key("DP")?, Some(Value::Integer(to_i32("DP", self.depth())?)));

        let keys = Keys::try_from(vec![format_key::GENOTYPE, parse_key("AO")?])
            .map_err(|e| Error::malformed("breakend record", e.to_string()))?;
        let values = self
            .reads
            .values()
            .map(|reads| match reads {
                Some(reads) => Ok(vec![
                    Some(SampleValue::String(HOM_ALT.to_string())),
                    Some(SampleValue::Integer(to_i32("AO", *reads)?)),
                ]),
                None => Ok(Vec::new()),
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let score = QualityScore::try_from(parse_column::<f32>(&self.score)?)
            .map_err(|e| Error::malformed("breakend record", e.to_string()))?;
        let position = usize::try_from(self.pos)
            .map_err(|e| Error::malformed("breakend record", e.to_string()))?;

        vcf::Record::builder()
            .set_chromosome(parse_column::<Chromosome>(&self.chrom)?)
            .set_position(Position::from(position))
            .set_reference_bases(parse_column::<ReferenceBases>("N")?)
            .set_alternate_bases(parse_column::<AlternateBases>(&format!("<{}>", self.svtype))?)
            .set_quality_score(score)
            .set_info(info)
            .set_genotypes(Genotypes::new(keys, values))
            .build()
            .map_err(|e| Error::malformed("breakend record", e.to_string()))
    }
}

/// Strip a `KEY:` prefix such as `MAX:` or `IDS:`.
fn strip_tag<'a>(what: &'static str, value: &'a str) -> Result<&'a str, Error> {
    value
        .split_once(':')
        .map(|(_, rest)| rest)
        .ok_or_else(|| Error::malformed(what, value))
}

/// Positions from `MAX:<chr>:<pos>;<chr>:<pos>`.
fn parse_breakpoint_max(value: &str) -> Result<(u64, u64), Error> {
    const WHAT: &str = "lumpy breakpoint";
    let (bp_1, bp_2) = strip_tag(WHAT, value)?
        .split_once(';')
        .ok_or_else(|| Error::malformed(WHAT, value))?;
    let position = |bp: &str| {
        bp.rsplit_once(':')
            .and_then(|(_, pos)| pos.parse::<u64>().ok())
            .ok_or_else(|| Error::malformed(WHAT, value))
    };
    Ok((position(bp_1)?, position(bp_2)?))
}

/// Supporting reads from `IDS:<id>,<reads>;...`.
fn parse_sample_ids(value: &str) -> Result<Vec<(usize, u64)>, Error> {
    const WHAT: &str = "lumpy sample ids";
    strip_tag(WHAT, value)?
        .split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, reads) = entry
                .split_once(',')
                .ok_or_else(|| Error::malformed(WHAT, value))?;
            match (id.parse::<usize>(), reads.parse::<u64>()) {
                (Ok(id), Ok(reads)) => Ok((id, reads)),
                _ => Err(Error::malformed(WHAT, value)),
            }
        })
        .collect()
}

fn translate_line(line: ReportLine, samples: &SampleIndex) -> Result<BreakendCall, Error> {
    let (pos_1, pos_2) = parse_breakpoint_max(&line.breakpoint_max)?;

    let category = strip_tag("lumpy type", &line.svtype)?;
    let svtype = category
        .get(..3)
        .ok_or_else(|| Error::malformed("lumpy type", line.svtype.clone()))?
        .to_string();

    let svlen = if line.chr_1 == line.chr_2 {
        let len = pos_2 as i64 - pos_1 as i64;
        if line.svtype.contains("DEL") {
            SvLen::Length(-len)
        } else {
            SvLen::Length(len)
        }
    } else {
        SvLen::NotApplicable
    };

    let mut reads: IndexMap<String, Option<u64>> =
        samples.uids().map(|uid| (uid.to_string(), None)).collect();
    for (id, count) in parse_sample_ids(&line.sample_ids)? {
        let uid = samples.uid(id).ok_or_else(|| {
            Error::malformed(
                "lumpy sample ids",
                format!("unknown sample id {} in {}", id, &line.sample_ids),
            )
        })?;
        if let Some(entry) = reads.get_mut(uid) {
            *entry = Some(entry.unwrap_or(0) + count);
        }
    }

    Ok(BreakendCall {
        chrom: line.chr_1,
        pos: pos_1,
        svtype,
        score: line.evidence_score,
        end_chrom: line.chr_2,
        end: pos_2,
        strand_1: line.strand_1,
        strand_2: line.strand_2,
        svlen,
        reads,
    })
}

/// Parse a lumpy report into breakend calls.
pub fn read_report<'a, R: Read + 'a>(
    report: R,
    samples: &'a SampleIndex,
) -> impl Iterator<Item = Result<BreakendCall, Error>> + 'a {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .from_reader(report)
        .into_deserialize::<ReportLine>()
        .map(move |line| translate_line(line?, samples))
}

/// The header of the translated VCF, one sample column per entry of `samples`.
pub fn header(samples: &SampleIndex) -> Result<vcf::Header, Error> {
    let mut builder = vcf::Header::builder()
        .set_file_format(FileFormat::new(4, 0))
        .add_info(
            info_key::END_POSITION,
            Map::<Info>::new(
                Number::Count(1),
                info::Type::Integer,
                "End position of the variant described in this record",
            ),
        )
        .add_info(
            parse_key("END_CHR")?,
            Map::<Info>::new(
                Number::Count(1),
                info::Type::String,
                "End chromosome of the variant described in this record",
            ),
        )
        .add_info(
            info_key::IS_IMPRECISE,
            Map::<Info>::new(
                Number::Count(0),
                info::Type::Flag,
                "Imprecise structural variation",
            ),
        )
        .add_info(
            info_key::SV_LENGTHS,
            Map::<Info>::new(
                Number::Unknown,
                info::Type::Integer,
                "Difference in length between REF and ALT alleles",
            ),
        )
        .add_info(
            info_key::SV_TYPE,
            Map::<Info>::new(
                Number::Count(1),
                info::Type::String,
                "Type of structural variant",
            ),
        )
        .add_info(
            parse_key("STRAND_1")?,
            Map::<Info>::new(
                Number::Count(1),
                info::Type::String,
                "Strand Orientation of SV Start",
            ),
        )
        .add_info(
            parse_key("STRAND_2")?,
            Map::<Info>::new(
                Number::Count(1),
                info::Type::String,
                "Strand Orientation of SV End",
            ),
        )
        .add_info(
            method_key()?,
            Map::<Info>::new(
                Number::Count(1),
                info::Type::String,
                "SV Caller used to predict",
            ),
        )
        .add_info(
            parse_key("DP")?,
            Map::<Info>::new(
                Number::Count(1),
                info::Type::Integer,
                "combined depth across samples",
            ),
        );

    for (symbol, description) in [
        ("DEL", "Deletion"),
        ("DUP", "Duplication"),
        ("INS", "Insertion of novel sequence"),
        ("INV", "Inversion"),
    ] {
        builder = builder.add_alternative_allele(
            parse_key(symbol)?,
            Map::<AlternativeAllele>::new(description),
        );
    }

    builder = builder
        .add_format(
            format_key::GENOTYPE,
            Map::<Format>::new(Number::Count(1), format::Type::String, "Genotype"),
        )
        .add_format(
            parse_key("AO")?,
            Map::<Format>::new(
                Number::Count(1),
                format::Type::Integer,
                "Alternate Allele Observations",
            ),
        );
    for uid in samples.uids() {
        builder = builder.add_sample_name(uid);
    }

    Ok(builder.build())
}

/// Translate the report at `report_path` into the VCF at `vcf_path`.
///
/// Returns the number of records written.
pub fn report_to_vcf<P, Q>(
    report_path: P,
    samples: &SampleIndex,
    vcf_path: Q,
) -> Result<usize, Error>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    tracing::info!(
        "translating {} to {}",
        report_path.as_ref().display(),
        vcf_path.as_ref().display()
    );
    let header = header(samples)?;
    let mut count = 0;
    write_atomically(vcf_path, |output: &mut dyn Write| {
        let mut writer = vcf::Writer::new(output);
        writer.write_header(&header)?;
        for call in read_report(open_read_maybe_gz(report_path)?, samples) {
            writer.write_record(&header, &call?.to_vcf_record()?)?;
            count += 1;
        }
        Ok(())
    })?;
    tracing::info!("... wrote {} records", count.separate_with_commas());
    Ok(count)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::common::noodles::read_vcf;
    use crate::record::VariantRecord;

    fn samples() -> SampleIndex {
        SampleIndex::new(["s1", "s2"])
    }

    fn line(fields: &[&str]) -> Vec<u8> {
        format!("{}\n", fields.join("\t")).into_bytes()
    }

    fn deletion() -> Vec<u8> {
        line(&[
            "chr1",
            "90",
            "110",
            "chr1",
            "240",
            "260",
            "7",
            "0.0123",
            "+",
            "-",
            "TYPE:DELETION",
            "IDS:0,5;1,3",
            "STRANDS:+-,8",
            "MAX:chr1:100;chr1:250",
            "95:chr1:95-105;chr1:245-255",
        ])
    }

    fn translate(bytes: Vec<u8>) -> Result<Vec<BreakendCall>, Error> {
        read_report(std::io::Cursor::new(bytes), &samples()).collect()
    }

    fn flattened(call: &BreakendCall) -> Result<VariantRecord, anyhow::Error> {
        let header = header(&samples())?;
        Ok(VariantRecord::from_vcf(&call.to_vcf_record()?, &header))
    }

    #[test]
    fn sample_index_lookup() {
        let index = samples();

        assert_eq!(index.uid(1), Some("s2"));
        assert_eq!(index.uid(2), None);
        assert_eq!(index.uids().collect::<Vec<_>>(), vec!["s1", "s2"]);
    }

    #[test]
    fn translate_deletion() -> Result<(), anyhow::Error> {
        let calls = translate(deletion())?;

        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.svlen, SvLen::Length(-150));
        assert_eq!(call.svtype, "DEL");
        assert_eq!(call.depth(), 8);

        let record = flattened(call)?;
        assert_eq!(record.chrom, "chr1");
        assert_eq!(record.pos, 100);
        assert_eq!(record.ref_allele, "N");
        assert_eq!(record.alt_allele, "<DEL>");
        assert_eq!(record.qual, Some(0.0123));
        assert_eq!(record.filter, None);
        assert_eq!(
            record.info.keys().cloned().collect::<Vec<_>>(),
            vec![
                "IMPRECISE",
                "SVTYPE",
                "END",
                "END_CHR",
                "STRAND_1",
                "STRAND_2",
                "SVLEN",
                "METHOD",
                "DP",
            ]
        );
        assert_eq!(record.info.get("IMPRECISE"), Some(&None));
        assert_eq!(record.info.get("END"), Some(&Some("250".to_string())));
        assert_eq!(record.info.get("SVLEN"), Some(&Some("-150".to_string())));
        assert_eq!(record.info.get("METHOD"), Some(&Some("LUMPY".to_string())));
        assert_eq!(record.format.as_deref(), Some("GT:AO"));
        assert_eq!(
            record.genotypes.values().cloned().collect::<Vec<_>>(),
            vec!["1/1:5".to_string(), "1/1:3".to_string()]
        );
        Ok(())
    }

    #[rstest]
    #[case("TYPE:DUPLICATION", "chr1", SvLen::Length(150))]
    #[case("TYPE:INVERSION", "chr1", SvLen::Length(150))]
    #[case("TYPE:INTERCHROM", "chr5", SvLen::NotApplicable)]
    fn translate_lengths(
        #[case] svtype: &str,
        #[case] chr_2: &str,
        #[case] expected: SvLen,
    ) -> Result<(), anyhow::Error> {
        let max = format!("MAX:chr1:100;{}:250", chr_2);
        let calls = translate(line(&[
            "chr1",
            "90",
            "110",
            chr_2,
            "240",
            "260",
            "1",
            "0.5",
            "+",
            "+",
            svtype,
            "IDS:1,2",
            "STRANDS:++,2",
            max.as_str(),
            "95:chr1:95-105;chr1:245-255",
        ]))?;

        assert_eq!(calls[0].svlen, expected);
        assert_eq!(calls[0].end_chrom, chr_2);
        Ok(())
    }

    #[test]
    fn unobserved_samples_are_no_calls() -> Result<(), anyhow::Error> {
        let calls = translate(line(&[
            "chr2",
            "1",
            "2",
            "chr9",
            "5",
            "6",
            "3",
            "1.5",
            "-",
            "+",
            "TYPE:INTERCHROM",
            "IDS:1,4",
            "STRANDS:-+,4",
            "MAX:chr2:1;chr9:5",
            "95:chr2:1-2;chr9:5-6",
        ]))?;

        let record = flattened(&calls[0])?;
        let genotypes = record.genotypes.values().cloned().collect::<Vec<_>>();
        assert_eq!(genotypes.len(), 2);
        assert!(genotypes[0].starts_with('.'), "{:?}", genotypes);
        assert_eq!(genotypes[1], "1/1:4");
        assert_eq!(record.info.get("SVLEN"), Some(&Some(".".to_string())));
        assert_eq!(record.info.get("DP"), Some(&Some("4".to_string())));
        Ok(())
    }

    #[rstest]
    #[case("IDS:2,4", "MAX:chr1:100;chr1:250")]
    #[case("IDS:0-4", "MAX:chr1:100;chr1:250")]
    #[case("IDS:0,4", "MAX:chr1:100")]
    #[case("IDS:0,4", "MAX:chr1:x;chr1:250")]
    fn malformed_lines(#[case] sample_ids: &str, #[case] max: &str) {
        let res = translate(line(&[
            "chr1",
            "90",
            "110",
            "chr1",
            "240",
            "260",
            "7",
            "0.1",
            "+",
            "-",
            "TYPE:DELETION",
            sample_ids,
            "STRANDS:+-,8",
            max,
            "95:chr1:95-105;chr1:245-255",
        ]));

        assert!(matches!(res, Err(Error::Malformed { .. })));
    }

    #[test]
    fn header_columns() -> Result<(), anyhow::Error> {
        let mut writer = vcf::Writer::new(Vec::new());
        writer.write_header(&header(&samples())?)?;
        let text = String::from_utf8(writer.get_ref().clone())?;

        assert!(text.starts_with("##fileformat=VCFv4.0\n"));
        insta::assert_snapshot!(
            text.lines().last().unwrap_or_default(),
            @"#CHROM	POS	ID	REF	ALT	QUAL	FILTER	INFO	FORMAT	s1	s2"
        );
        Ok(())
    }

    #[test]
    fn report_to_vcf_writes_file() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let report = tmpdir.join("BWA_BAM.lumpy.txt");
        let path = tmpdir.join("BWA_BAM.vcf");
        std::fs::copy("tests/lumpy/BWA_BAM.lumpy.txt", &report)?;

        let count = report_to_vcf(&report, &samples(), &path)?;

        assert_eq!(count, 2);
        let (header, records) = read_vcf(&path)?;
        assert_eq!(
            header.sample_names().iter().cloned().collect::<Vec<_>>(),
            vec!["s1", "s2"]
        );
        assert_eq!(records.len(), 2);
        for record in &records {
            let record = VariantRecord::from_vcf(record, &header);
            assert_eq!(record.info.get("METHOD"), Some(&Some("LUMPY".to_string())));
        }
        Ok(())
    }
}

//! Variant records as handed to persistence.

use indexmap::IndexMap;
use noodles_vcf as vcf;
use serde::Serialize;
use vcf::record::info::field::{key, value::Array, Value};

use crate::err::Error;

/// Placeholder for a missing value and for a no-call genotype.
pub const MISSING: &str = ".";

/// Length of a structural variant.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SvLen {
    Length(i64),
    /// Length is undefined, e.g. for breakpoints on different sequences.
    NotApplicable,
}

impl std::fmt::Display for SvLen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SvLen::Length(len) => write!(f, "{}", len),
            SvLen::NotApplicable => write!(f, "{}", MISSING),
        }
    }
}

impl SvLen {
    /// The first `SVLEN` value of `info`, `None` if there is no such entry.
    ///
    /// Handles both the single value (`Number=1`) and the per-allele
    /// (`Number=A`) declaration.
    pub fn from_info(info: &vcf::record::Info) -> Result<Option<Self>, Error> {
        let svlen = match info.get(&key::SV_LENGTHS) {
            None => return Ok(None),
            Some(None) => SvLen::NotApplicable,
            Some(Some(Value::Integer(len))) => SvLen::Length(i64::from(*len)),
            Some(Some(Value::Array(Array::Integer(lens)))) => match lens.first() {
                Some(Some(len)) => SvLen::Length(i64::from(*len)),
                _ => SvLen::NotApplicable,
            },
            Some(Some(value)) => return Err(Error::malformed("SVLEN value", value.to_string())),
        };
        Ok(Some(svlen))
    }

    /// The INFO value, one entry for the single alternate allele.
    pub fn to_value(self) -> Result<Value, Error> {
        let len = match self {
            SvLen::Length(len) => Some(
                i32::try_from(len)
                    .map_err(|e| Error::malformed("SVLEN value", format!("{}: {}", len, e)))?,
            ),
            SvLen::NotApplicable => None,
        };
        Ok(Value::Array(Array::Integer(vec![len])))
    }
}

/// One variant record, flattened to text values.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    pub pos: u64,
    pub id: Option<String>,
    pub ref_allele: String,
    pub alt_allele: String,
    pub qual: Option<f32>,
    pub filter: Option<String>,
    /// INFO entries in record order; flags have no value.
    pub info: IndexMap<String, Option<String>>,
    /// The FORMAT column, e.g. `GT:AO`.
    pub format: Option<String>,
    /// Genotype column per sample, in header order.
    pub genotypes: IndexMap<String, String>,
}

/// `None` for empty or missing (`.`) values.
fn optional(value: String) -> Option<String> {
    if value.is_empty() || value == MISSING {
        None
    } else {
        Some(value)
    }
}

impl VariantRecord {
    /// Convert `record`; genotype columns are assigned to the samples of `header`.
    pub fn from_vcf(record: &vcf::Record, header: &vcf::Header) -> Self {
        let info = record
            .info()
            .keys()
            .map(|key| {
                let value = record.info().get(key).flatten().map(|value| value.to_string());
                (key.to_string(), value)
            })
            .collect();

        let genotypes_column = record.genotypes().to_string();
        let mut columns = genotypes_column.split('\t');
        let format = columns.next().map(String::from).and_then(optional);
        let genotypes = header
            .sample_names()
            .iter()
            .zip(columns)
            .map(|(sample, gt)| (sample.clone(), gt.to_string()))
            .collect();

        Self {
            chrom: record.chromosome().to_string(),
            pos: usize::from(record.position()) as u64,
            id: optional(record.ids().to_string()),
            ref_allele: record.reference_bases().to_string(),
            alt_allele: record.alternate_bases().to_string(),
            qual: record.quality_score().map(f32::from),
            filter: record.filters().map(|filters| filters.to_string()),
            info,
            format,
            genotypes,
        }
    }

    /// Make sure that every sample in `samples` has a genotype, defaulting to no-call.
    pub fn fill_missing_samples(&mut self, samples: &[String]) {
        for sample in samples {
            self.genotypes
                .entry(sample.clone())
                .or_insert_with(|| MISSING.to_string());
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const VCF: &str = "##fileformat=VCFv4.1\n\
        ##INFO=<ID=SVLEN,Number=1,Type=Integer,Description=\"Length\">\n\
        ##INFO=<ID=SVTYPE,Number=1,Type=String,Description=\"Type\">\n\
        ##INFO=<ID=IMPRECISE,Number=0,Type=Flag,Description=\"Imprecise\">\n\
        ##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n\
        chr1\t100\t.\tA\t<DEL>\t20\tPASS\tSVLEN=-100;SVTYPE=DEL;IMPRECISE\tGT\t1/1\n";

    fn read(text: &str) -> Result<(vcf::Header, vcf::Record), anyhow::Error> {
        let mut reader = vcf::Reader::new(std::io::Cursor::new(text.as_bytes().to_vec()));
        let header = reader.read_header()?;
        let record = reader
            .records(&header)
            .next()
            .ok_or_else(|| anyhow::anyhow!("no record"))??;
        Ok((header, record))
    }

    #[test]
    fn svlen_from_info() -> Result<(), anyhow::Error> {
        let (_, record) = read(VCF)?;

        assert_eq!(SvLen::from_info(record.info())?, Some(SvLen::Length(-100)));
        Ok(())
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(Value::Integer(-7)), Some(SvLen::Length(-7)))]
    #[case(Some(Value::Array(Array::Integer(vec![Some(12), Some(4)]))), Some(SvLen::Length(12)))]
    #[case(Some(Value::Array(Array::Integer(vec![None]))), Some(SvLen::NotApplicable))]
    fn svlen_values(
        #[case] value: Option<Value>,
        #[case] expected: Option<SvLen>,
    ) -> Result<(), anyhow::Error> {
        let mut info = vcf::record::Info::default();
        if let Some(value) = value {
            info.insert(key::SV_LENGTHS, Some(value));
        }

        assert_eq!(SvLen::from_info(&info)?, expected);
        Ok(())
    }

    #[test]
    fn svlen_garbage() {
        let mut info = vcf::record::Info::default();
        info.insert(key::SV_LENGTHS, Some(Value::String("abc".into())));

        assert!(SvLen::from_info(&info).is_err());
    }

    #[test]
    fn svlen_to_value() -> Result<(), anyhow::Error> {
        assert_eq!(SvLen::Length(-150).to_value()?.to_string(), "-150");
        assert_eq!(SvLen::NotApplicable.to_value()?.to_string(), ".");
        assert!(SvLen::Length(i64::MAX).to_value().is_err());
        Ok(())
    }

    #[test]
    fn from_vcf_keeps_info_order() -> Result<(), anyhow::Error> {
        let (header, record) = read(VCF)?;

        let record = VariantRecord::from_vcf(&record, &header);

        assert_eq!(record.chrom, "chr1");
        assert_eq!(record.pos, 100);
        assert_eq!(record.id, None);
        assert_eq!(record.alt_allele, "<DEL>");
        assert_eq!(record.qual, Some(20.0));
        assert_eq!(
            record.info.keys().cloned().collect::<Vec<_>>(),
            vec!["SVLEN".to_string(), "SVTYPE".into(), "IMPRECISE".into()]
        );
        assert_eq!(record.info.get("SVTYPE"), Some(&Some("DEL".to_string())));
        assert_eq!(record.format.as_deref(), Some("GT"));
        assert_eq!(record.genotypes.get("S1").map(String::as_str), Some("1/1"));
        Ok(())
    }

    #[test]
    fn fill_missing_samples() -> Result<(), anyhow::Error> {
        let (header, record) = read(VCF)?;
        let mut record = VariantRecord::from_vcf(&record, &header);

        record.fill_missing_samples(&["S1".to_string(), "S2".to_string()]);

        assert_eq!(record.genotypes.get("S1").map(String::as_str), Some("1/1"));
        assert_eq!(record.genotypes.get("S2").map(String::as_str), Some("."));
        Ok(())
    }

    #[test]
    fn serialize_json() -> Result<(), anyhow::Error> {
        let (header, record) = read(VCF)?;
        let record = VariantRecord::from_vcf(&record, &header);

        let value = serde_json::to_value(&record)?;

        assert_eq!(value["info"]["IMPRECISE"], serde_json::Value::Null);
        assert_eq!(value["info"]["SVLEN"], serde_json::json!("-100"));
        assert_eq!(value["genotypes"], serde_json::json!({"S1": "1/1"}));
        assert!(value.get("id").is_none());
        Ok(())
    }
}

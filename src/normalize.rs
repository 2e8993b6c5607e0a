//! Post-processing of structural variant VCFs written by pindel and delly.
//!
//! Both tools declare `SVTYPE` and `SVLEN` with `Number=1` although the
//! fields hold one value per alternate allele once records are merged.  The
//! header is rewritten to `Number=A`, a `METHOD` INFO field is declared, and
//! each record is stamped with the calling method.

use std::io::Write;
use std::path::Path;

use noodles_vcf as vcf;
use thousands::Separable;
use vcf::header::record::value::{
    map::{info, Info},
    Map,
};
use vcf::header::Number;
use vcf::record::info::field::{key, Key, Value};

use crate::common::io::write_atomically;
use crate::common::noodles::{open_vcf_reader, parse_key};
use crate::err::Error;
use crate::record::SvLen;

/// INFO fields that hold one value per alternate allele.
pub const PER_ALLELE_FIELDS: [Key; 2] = [key::SV_TYPE, key::SV_LENGTHS];

/// Description of the `METHOD` INFO field.
pub const METHOD_DESCRIPTION: &str = "Type of approach used to detect SV";

/// Key of the `METHOD` INFO field.
pub fn method_key() -> Result<Key, Error> {
    parse_key("METHOD")
}

/// Tool-specific handling of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Make `SVLEN` absolute and drop records shorter than `min_sv_length`.
    Pindel { min_sv_length: i64 },
    /// Only stamp the method.
    Delly,
}

impl Flavor {
    /// Value written to the `METHOD` INFO field.
    pub fn method(&self) -> &'static str {
        match self {
            Flavor::Pindel { .. } => "PINDEL",
            Flavor::Delly => "DELLY",
        }
    }

    /// Normalize `record` in place, returning `false` if it is to be dropped.
    pub fn process(&self, record: &mut vcf::Record) -> Result<bool, Error> {
        if let Flavor::Pindel { min_sv_length } = self {
            // pindel reports deletions with negative length
            let svlen = match SvLen::from_info(record.info())? {
                Some(SvLen::Length(len)) => len.abs(),
                Some(SvLen::NotApplicable) | None => return Ok(false),
            };
            if svlen < *min_sv_length {
                return Ok(false);
            }
            record
                .info_mut()
                .insert(key::SV_LENGTHS, Some(SvLen::Length(svlen).to_value()?));
        }
        record
            .info_mut()
            .insert(method_key()?, Some(Value::String(self.method().to_string())));
        Ok(true)
    }
}

/// Rewrite the header as described in the module documentation.
///
/// Applying this more than once yields the same header.
pub fn normalize_header(header: &mut vcf::Header) -> Result<(), Error> {
    let infos = header.infos_mut();
    let mut modified = 0;
    for field in PER_ALLELE_FIELDS {
        if let Some(map) = infos.get_mut(&field) {
            if map.number() != Number::A {
                let per_allele =
                    Map::<Info>::new(Number::A, map.ty(), map.description().to_string());
                *map = per_allele;
                modified += 1;
            }
        }
    }
    tracing::debug!("declared {} header lines as Number=A", modified);

    let method = method_key()?;
    if !infos.contains_key(&method) {
        infos.insert(
            method,
            Map::<Info>::new(Number::Count(1), info::Type::String, METHOD_DESCRIPTION),
        );
    }
    Ok(())
}

/// Counts from one normalization run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub read: usize,
    pub written: usize,
}

/// Normalize the VCF file at `path` in place.
///
/// The output is written to a temporary file that replaces `path` only
/// after all records have been processed.
pub fn postprocess_vcf<P: AsRef<Path>>(path: P, flavor: Flavor) -> Result<Stats, Error> {
    let path = path.as_ref();
    tracing::info!("post-processing {} as {}", path.display(), flavor.method());
    let mut stats = Stats::default();

    write_atomically(path, |output: &mut dyn Write| {
        let (mut reader, mut header) = open_vcf_reader(path)?;
        normalize_header(&mut header)?;
        let mut writer = vcf::Writer::new(output);
        writer.write_header(&header)?;

        for result in reader.records(&header) {
            let mut record = result?;
            stats.read += 1;
            if flavor.process(&mut record)? {
                writer.write_record(&header, &record)?;
                stats.written += 1;
            }
        }
        Ok(())
    })?;

    tracing::info!(
        "... kept {} of {} records",
        stats.written.separate_with_commas(),
        stats.read.separate_with_commas()
    );
    Ok(stats)
}

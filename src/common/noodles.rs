//! Common utility code for noodles.

use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use noodles_vcf as vcf;

use crate::common::io::open_read_maybe_gz;
use crate::err::Error;

/// Open the (possibly gzip-compressed) VCF file at `path` and read its header.
pub fn open_vcf_reader<P>(
    path: P,
) -> Result<(vcf::Reader<Box<dyn BufRead>>, vcf::Header), Error>
where
    P: AsRef<Path>,
{
    let mut reader = vcf::Reader::new(open_read_maybe_gz(path.as_ref())?);
    let header = reader.read_header()?;
    Ok((reader, header))
}

/// Read the header and all records of the VCF file at `path`.
pub fn read_vcf<P>(path: P) -> Result<(vcf::Header, Vec<vcf::Record>), Error>
where
    P: AsRef<Path>,
{
    let (mut reader, header) = open_vcf_reader(path)?;
    let records = reader.records(&header).collect::<Result<Vec<_>, _>>()?;
    Ok((header, records))
}

/// Parse an INFO or FORMAT key, e.g., `"METHOD"`.
pub fn parse_key<K>(key: &str) -> Result<K, Error>
where
    K: FromStr,
    K::Err: std::fmt::Display,
{
    key.parse()
        .map_err(|e| Error::malformed("VCF key", format!("{}: {}", key, e)))
}

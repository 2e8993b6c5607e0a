//! Structural variant related sub commands.

pub mod lumpy_to_vcf;
pub mod postprocess;

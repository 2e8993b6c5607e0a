//! Configuration of the worker, loaded once at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::err::Error;

/// Top-level configuration, read from a TOML file.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Location of the external binaries.
    pub tools: ToolsConf,
    /// Fixed calling parameters for freebayes.
    pub freebayes: FreebayesConf,
    /// Pindel conversion and filtration.
    pub pindel: PindelConf,
    /// Lumpy evidence options.
    pub lumpy: LumpyConf,
}

/// Location of the external binaries.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct ToolsConf {
    /// Directory with one sub directory per tool, e.g., `freebayes/freebayes`.
    pub tools_dir: PathBuf,
    /// Program used for concatenating VCF files.
    pub vcf_concat: String,
    /// Program used for sorting VCF files.
    pub vcf_sort: String,
    /// Upper bound on the runtime of any single external process.
    pub timeout_secs: u64,
}

impl Default for ToolsConf {
    fn default() -> Self {
        Self {
            tools_dir: PathBuf::from("tools"),
            vcf_concat: String::from("vcf-concat"),
            vcf_sort: String::from("vcf-sort"),
            timeout_secs: 48 * 60 * 60,
        }
    }
}

impl ToolsConf {
    /// Path to binary `name` of `tool`, i.e., `<tools_dir>/<tool>/<name>`.
    pub fn binary(&self, tool: &str, name: &str) -> PathBuf {
        self.tools_dir.join(tool).join(name)
    }

    /// Like `binary` but raises a configuration error if the binary is missing.
    pub fn require_binary(&self, tool: &str, name: &str) -> Result<PathBuf, Error> {
        let path = self.binary(tool, name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::Configuration(format!(
                "{} is not installed, expected binary at {}",
                tool,
                path.display()
            )))
        }
    }

    /// The process timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Fixed calling parameters for freebayes.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct FreebayesConf {
    pub pvar: f64,
    pub ploidy: u32,
    pub min_alternate_fraction: f64,
    pub min_base_quality: u32,
    pub min_mapping_quality: u32,
}

impl Default for FreebayesConf {
    fn default() -> Self {
        Self {
            pvar: 0.001,
            ploidy: 2,
            min_alternate_fraction: 0.3,
            min_base_quality: 25,
            min_mapping_quality: 30,
        }
    }
}

/// Pindel conversion and filtration.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct PindelConf {
    /// Records with an absolute SVLEN below this are dropped as noise.
    pub min_sv_length: i64,
    /// Minimal number of supporting reads for `pindel2vcf -mc`.
    pub min_supporting_reads: u32,
}

impl Default for PindelConf {
    fn default() -> Self {
        Self {
            min_sv_length: 10,
            min_supporting_reads: 1,
        }
    }
}

/// Lumpy evidence options.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct LumpyConf {
    /// Minimal weight for a call (`-mw`).
    pub min_weight: u32,
    /// Trim threshold (`-tt`).
    pub trim_threshold: f64,
    /// Options shared by all paired-end evidence sets.
    pub paired_end: PairedEndConf,
    /// Options shared by all split-read evidence sets.
    pub split_read: SplitReadConf,
}

impl Default for LumpyConf {
    fn default() -> Self {
        Self {
            min_weight: 1,
            trim_threshold: 0.0,
            paired_end: Default::default(),
            split_read: Default::default(),
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct PairedEndConf {
    pub back_distance: u32,
    pub weight: u32,
    pub min_mapping_threshold: u32,
    pub discordant_z: u32,
}

impl Default for PairedEndConf {
    fn default() -> Self {
        Self {
            back_distance: 20,
            weight: 1,
            min_mapping_threshold: 20,
            discordant_z: 4,
        }
    }
}

/// Split reads get a higher weight than discordant pairs by default.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct SplitReadConf {
    pub back_distance: u32,
    pub weight: u32,
    pub min_mapping_threshold: u32,
}

impl Default for SplitReadConf {
    fn default() -> Self {
        Self {
            back_distance: 20,
            weight: 2,
            min_mapping_threshold: 20,
        }
    }
}

impl Config {
    /// Load configuration from TOML file at `path` or use defaults when `None`.
    ///
    /// The tools directory is shell-expanded and may be overridden by `tools_dir`.
    pub fn load(path: Option<&Path>, tools_dir: Option<&str>) -> Result<Self, Error> {
        let mut config: Config = match path {
            Some(path) => {
                tracing::debug!("loading configuration from {}", path.display());
                toml::from_str(&std::fs::read_to_string(path)?)?
            }
            None => Default::default(),
        };

        let raw_tools_dir = match tools_dir {
            Some(tools_dir) => tools_dir.to_string(),
            None => config.tools.tools_dir.to_string_lossy().into_owned(),
        };
        let expanded = shellexpand::full(&raw_tools_dir).map_err(|e| {
            Error::Configuration(format!("cannot expand tools dir {}: {}", raw_tools_dir, e))
        })?;
        config.tools.tools_dir = PathBuf::from(expanded.as_ref());

        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Config;

    #[test]
    fn load_defaults() -> Result<(), anyhow::Error> {
        let config = Config::load(None, None)?;

        assert_eq!(config.freebayes.ploidy, 2);
        assert_eq!(config.pindel.min_sv_length, 10);
        assert_eq!(config.lumpy.split_read.weight, 2);
        assert_eq!(config.tools.vcf_sort, "vcf-sort");

        Ok(())
    }

    #[test]
    fn load_partial_toml() -> Result<(), anyhow::Error> {
        let config = Config::load(Some("tests/conf/partial.toml".as_ref()), None)?;

        assert_eq!(config.tools.tools_dir, std::path::PathBuf::from("/opt/tools"));
        assert_eq!(config.tools.timeout_secs, 3600);
        assert_eq!(config.freebayes.min_mapping_quality, 20);
        assert_eq!(config.freebayes.ploidy, 2);
        assert_eq!(config.pindel.min_sv_length, 50);
        assert_eq!(config.lumpy, super::LumpyConf::default());

        Ok(())
    }

    #[test]
    fn tools_dir_override() -> Result<(), anyhow::Error> {
        let config = Config::load(Some("tests/conf/partial.toml".as_ref()), Some("/srv/bin"))?;

        assert_eq!(config.tools.tools_dir, std::path::PathBuf::from("/srv/bin"));
        assert_eq!(
            config.tools.binary("pindel", "pindel2vcf"),
            std::path::PathBuf::from("/srv/bin/pindel/pindel2vcf")
        );

        Ok(())
    }

    #[test]
    fn require_binary_missing() {
        let config = Config::default();

        let res = config.tools.require_binary("delly", "delly");

        assert!(matches!(res, Err(crate::err::Error::Configuration(_))));
    }
}

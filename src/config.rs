//! Command-line parsing and run configuration.
//!
//! The positional arguments follow the classic harness layout
//! `N M DISTRIBUTION [EXTRA] [THREADS]`, where `EXTRA` is the selectivity for
//! the uniform distribution or a file path for the clustered and genome
//! distributions.

use std::{fmt, path::PathBuf};

use clap::{Parser, ValueEnum};
use mdrq::IndexKind;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const DEFAULT_GENOMES_FILE: &str = "../../1000genomes_import/chr22_feature.vectors";
pub const DEFAULT_POWER_FILE: &str = "../../power_import/DEBS2012-ChallengeData.txt";

/// The power corpus has exactly three numeric attributes per row.
pub const POWER_DIMENSIONS: usize = 3;

#[derive(Parser, Debug, Clone)]
#[command(name = "mdrq-bench")]
#[command(about = "Benchmark multi-dimensional range-query indexes")]
#[command(version)]
pub struct Cli {
    /// Number of points
    pub n: usize,

    /// Number of dimensions
    pub m: usize,

    /// 0 = normal, 1 = clustered (csv file), 2 = uniform, 3 = genomes, 4 = power
    pub distribution: u8,

    /// Selectivity for distribution 2, file path for distributions 1 and 3
    pub extra: Option<String>,

    /// Worker pool size (defaults to the number of logical CPUs)
    pub threads: Option<usize>,

    /// Index structure(s) to benchmark
    #[arg(long, value_enum, default_value = "all")]
    pub index: IndexChoice,

    /// Seed for data generation, shuffling and query sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Feature-vector file read by distribution 3
    #[arg(long, default_value = DEFAULT_GENOMES_FILE)]
    pub genomes_file: PathBuf,

    /// Tab-separated file read by distribution 4
    #[arg(long, default_value = DEFAULT_POWER_FILE)]
    pub power_file: PathBuf,

    /// Check every parallel range result against the serial one (untimed)
    #[arg(long)]
    pub verify_ranges: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IndexChoice {
    Bbtree,
    Rtree,
    Scan,
    All,
}

impl IndexChoice {
    #[must_use]
    pub fn kinds(self) -> Vec<IndexKind> {
        match self {
            IndexChoice::Bbtree => vec![IndexKind::BbTree],
            IndexChoice::Rtree => vec![IndexKind::RTree],
            IndexChoice::Scan => vec![IndexKind::Scan],
            IndexChoice::All => IndexKind::ALL.to_vec(),
        }
    }
}

/// Where the dataset comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Normal,
    Clustered,
    Uniform,
    Genomes,
    Power,
}

impl TryFrom<u8> for Distribution {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Distribution::Normal),
            1 => Ok(Distribution::Clustered),
            2 => Ok(Distribution::Uniform),
            3 => Ok(Distribution::Genomes),
            4 => Ok(Distribution::Power),
            other => Err(ConfigError::UnknownDistribution(other)),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Distribution::Normal => "normal",
            Distribution::Clustered => "clustered",
            Distribution::Uniform => "uniform",
            Distribution::Genomes => "genomes",
            Distribution::Power => "power",
        };
        f.write_str(name)
    }
}

/// Resolved, validated run parameters. Read-only once built.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub points: usize,
    /// Effective dimensionality (always 3 for the power corpus).
    pub dimensions: usize,
    pub distribution: Distribution,
    pub selectivity: Option<f32>,
    /// Comma-separated input for [`Distribution::Clustered`].
    pub data_file: Option<PathBuf>,
    /// Query pairs for [`Distribution::Genomes`].
    pub query_file: Option<PathBuf>,
    pub genomes_file: PathBuf,
    pub power_file: PathBuf,
    pub threads: usize,
    pub seed: u64,
    pub indexes: Vec<IndexKind>,
    pub verify_ranges: bool,
}

impl Cli {
    /// Validates the arguments and fills in defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid argument.
    pub fn resolve(self) -> Result<WorkloadConfig, ConfigError> {
        if self.n == 0 {
            return Err(ConfigError::NoPoints);
        }
        if self.m == 0 {
            return Err(ConfigError::NoDimensions);
        }
        let distribution = Distribution::try_from(self.distribution)?;

        let mut selectivity = None;
        let mut data_file = None;
        let mut query_file = None;
        match distribution {
            Distribution::Uniform => {
                if let Some(extra) = &self.extra {
                    selectivity = Some(parse_selectivity(extra)?);
                }
            }
            Distribution::Clustered => {
                let path = self.extra.ok_or(ConfigError::MissingPath(distribution))?;
                data_file = Some(PathBuf::from(path));
            }
            Distribution::Genomes => {
                let path = self.extra.ok_or(ConfigError::MissingPath(distribution))?;
                query_file = Some(PathBuf::from(path));
            }
            Distribution::Normal | Distribution::Power => {
                if let Some(extra) = &self.extra {
                    debug!("ignoring extra argument {extra:?} for {distribution} distribution");
                }
            }
        }

        let threads = match self.threads {
            Some(0) => return Err(ConfigError::NoThreads),
            Some(threads) => threads,
            None => num_cpus::get(),
        };

        let dimensions = if distribution == Distribution::Power {
            if self.m != POWER_DIMENSIONS {
                warn!(
                    requested = self.m,
                    "power corpus has {POWER_DIMENSIONS} dimensions, ignoring requested dimensionality"
                );
            }
            POWER_DIMENSIONS
        } else {
            self.m
        };

        let seed = self.seed.unwrap_or_else(|| rand::thread_rng().gen());

        Ok(WorkloadConfig {
            points: self.n,
            dimensions,
            distribution,
            selectivity,
            data_file,
            query_file,
            genomes_file: self.genomes_file,
            power_file: self.power_file,
            threads,
            seed,
            indexes: self.index.kinds(),
            verify_ranges: self.verify_ranges,
        })
    }
}

fn parse_selectivity(raw: &str) -> Result<f32, ConfigError> {
    match raw.trim().parse::<f32>() {
        Ok(s) if s.is_finite() && s > 0.0 && s <= 1.0 => Ok(s),
        _ => Err(ConfigError::Selectivity(raw.to_string())),
    }
}

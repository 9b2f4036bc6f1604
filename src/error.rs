//! Error types for the benchmark harness.
//!
//! Configuration and input problems stop a run before anything is measured.
//! A [`CorrectnessViolation`] means an index gave a wrong answer, which
//! invalidates every timing taken so far.

use std::{io, path::PathBuf};

use mdrq::{Id, Partitioning};
use thiserror::Error;

use crate::config::Distribution;

/// Invalid startup arguments.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("point count must be at least 1")]
    NoPoints,

    #[error("dimensionality must be at least 1")]
    NoDimensions,

    #[error("unknown distribution code {0} (expected 0-4)")]
    UnknownDistribution(u8),

    #[error("selectivity must be a fraction in (0, 1], got {0:?}")]
    Selectivity(String),

    #[error("distribution {0} requires a file path")]
    MissingPath(Distribution),

    #[error("thread count must be at least 1")]
    NoThreads,
}

/// Failures while building the dataset or reading queries.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: invalid query bound {token:?}", path.display())]
    QueryBound {
        path: PathBuf,
        line: usize,
        token: String,
    },

    #[error("dataset is empty, no points could be loaded")]
    EmptyDataset,

    #[error("invalid normal distribution: {0}")]
    Normal(#[from] rand_distr::NormalError),
}

/// An index returned something other than the expected answer.
#[derive(Error, Debug)]
pub enum CorrectnessViolation {
    #[error("{index}: point query #{position} returned {found:?}, expected {expected}")]
    PointQuery {
        index: &'static str,
        position: usize,
        expected: Id,
        found: Option<Id>,
    },

    #[error("{index}: delete #{position} reported that the point was not found")]
    DeleteFailed { index: &'static str, position: usize },

    #[error("{index}: delete #{position} changed the count from {before} to {after}")]
    CountMismatch {
        index: &'static str,
        position: usize,
        before: usize,
        after: usize,
    },

    #[error(
        "{index}: {partitioning} returned {parallel} ids for query #{query}, serial search returned {serial}"
    )]
    RangeMismatch {
        index: &'static str,
        partitioning: Partitioning,
        query: usize,
        serial: usize,
        parallel: usize,
    },
}

#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("correctness violation: {0}")]
    Correctness(#[from] CorrectnessViolation),

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write report: {0}")]
    Report(#[from] io::Error),
}

impl BenchError {
    /// Process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            BenchError::Correctness(_) => 2,
            _ => 1,
        }
    }
}

pub type BenchResult<T> = Result<T, BenchError>;

/// Exit status for a rejected command line: help and version succeed, usage
/// errors exit 1.
#[must_use]
pub fn usage_exit_code(err: &clap::Error) -> u8 {
    u8::from(err.use_stderr())
}

/// Exit status for an error that reached `main`, taken from the first
/// [`BenchError`] in its chain.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BenchError>())
        .map_or(1, BenchError::exit_code)
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use clap::Parser;

    use super::*;
    use crate::Cli;

    fn rejected(args: &[&str]) -> clap::Error {
        let mut argv = vec!["mdrq-bench"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect_err("command line is rejected")
    }

    #[test]
    fn help_and_version_succeed() {
        assert_eq!(usage_exit_code(&rejected(&["--help"])), 0);
        assert_eq!(usage_exit_code(&rejected(&["--version"])), 0);
    }

    #[test]
    fn usage_errors_exit_one() {
        assert_eq!(usage_exit_code(&rejected(&[])), 1);
        assert_eq!(usage_exit_code(&rejected(&["10", "3"])), 1);
        assert_eq!(usage_exit_code(&rejected(&["10", "3", "x"])), 1);
        assert_eq!(usage_exit_code(&rejected(&["10", "3", "0", "--index", "kd"])), 1);
    }

    #[test]
    fn correctness_violations_exit_two() {
        let violation: BenchResult<()> = Err(CorrectnessViolation::DeleteFailed {
            index: "Scan",
            position: 3,
        }
        .into());
        let err = violation.context("benchmark aborted").unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn other_failures_exit_one() {
        let config: BenchResult<()> = Err(ConfigError::NoThreads.into());
        let err = config.context("invalid configuration").unwrap_err();
        assert_eq!(exit_code(&err), 1);

        let load: BenchResult<()> = Err(LoadError::EmptyDataset.into());
        let err = load.context("benchmark aborted").unwrap_err();
        assert_eq!(exit_code(&err), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("unexpected")), 1);
    }
}

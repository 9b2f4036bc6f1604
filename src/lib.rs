pub mod config;
pub mod dataset;
pub mod error;
pub mod queries;
pub mod runner;
pub mod stats;

pub use config::{Cli, Distribution, WorkloadConfig};
pub use error::{BenchError, ConfigError, CorrectnessViolation, LoadError};
pub use queries::BoundingBoxQuery;
pub use runner::{run, Phase, PhaseReport, PhaseRunner};
pub use stats::{Summary, Throughput};

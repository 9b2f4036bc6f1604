use std::{io, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use mdrq_bench::{
    error::{exit_code, usage_exit_code},
    BenchError, Cli,
};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(usage_exit_code(&err));
        }
    };

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli
        .resolve()
        .map_err(BenchError::from)
        .context("invalid configuration")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    mdrq_bench::run(&config, &mut out).context("benchmark aborted")?;
    Ok(())
}

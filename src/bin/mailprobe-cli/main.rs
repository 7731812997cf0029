mod args;
mod input;
mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use mailprobe_lib::{BatchRunner, VerificationResult, Verifier};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;
    let format = cli.output_format()?;

    let verifier =
        Verifier::from_system_conf(cli.verifier_options()).context("initialise DNS resolver")?;
    let results = run(&cli, verifier)?;

    output::write_report(&results, format, cli.out.as_deref())?;

    // codes de sortie : 0 tout Valid, 2 sinon, 1 fatal
    if !output::all_valid(&results) {
        std::process::exit(2);
    }
    Ok(())
}

fn run(cli: &Cli, verifier: Verifier) -> Result<Vec<VerificationResult>> {
    match &cli.cmd {
        Commands::Verify { email } => Ok(vec![verifier.verify_one(email)]),
        Commands::Batch(source) => {
            let addresses = input::read_addresses(source)?;
            let runner = BatchRunner::new(Arc::new(verifier), cli.batch_options())?;
            Ok(runner.verify_batch(&addresses))
        }
    }
}

/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid --log-level '{level}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

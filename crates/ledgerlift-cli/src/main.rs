//! ledgerlift CLI - replay legacy PIM journals and migrate them
//!
//! Reads a legacy export, verifies every journal's hash chain and uploads the
//! replayed revisions into a destination database.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::collections::run_collections;
use crate::commands::common::{load_config, resolve_destination};
use crate::commands::completions::run_completions;
use crate::commands::inspect::run_inspect;
use crate::commands::migrate::{run_migrate, MigrateArgs};
use crate::commands::probe::run_probe;
use crate::error::CliError;

const DEFAULT_LOG_DIRECTIVE: &str = "ledgerlift=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(error.exit_code());
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive: Directive = DEFAULT_LOG_DIRECTIVE
        .parse()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Migrate {
            export,
            derived_key,
            destination,
            chunk_size,
            journals,
            dry_run,
            json,
        } => {
            let args = MigrateArgs {
                export,
                derived_key,
                destination,
                chunk_size,
                journals,
                dry_run,
                json,
            };
            run_migrate(args, config_path).await?;
        }
        Commands::Inspect {
            export,
            derived_key,
            json,
        } => run_inspect(&export, derived_key, json)?,
        Commands::Collections { destination, json } => {
            let config = load_config(config_path)?;
            let path = resolve_destination(destination, &config);
            run_collections(&path, json).await?;
        }
        Commands::Probe { url } => {
            let config = load_config(config_path)?;
            run_probe(url, &config).await?;
        }
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}

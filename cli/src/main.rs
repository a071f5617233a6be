/*!

This is the command line interface for creating, deleting and listing EKS clusters.

!*/

mod create;
mod delete;
mod get;
mod parse;
mod provider;
mod wait_nodes;

use anyhow::{anyhow, Result};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

/// Workspace crates whose logs are shown at the level given by `--log-level`.
const LOG_TARGETS: &[&str] = &[
    env!("CARGO_CRATE_NAME"),
    "eksflow_model",
    "eksflow_orchestrator",
    "eksflow_providers",
];

/// The command line interface for managing EKS clusters.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. See https://docs.rs/env_logger/latest
    #[clap(long = "log-level", default_value = "info", global = true)]
    log_level: LevelFilter,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Create resources.
    #[clap(subcommand)]
    Create(create::Create),
    /// Delete resources.
    #[clap(subcommand)]
    Delete(delete::Delete),
    /// Get resources.
    #[clap(subcommand)]
    Get(get::Get),
    /// Wait for the nodes of a cluster to become ready.
    WaitNodes(wait_nodes::WaitNodes),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.log_level);
    if let Err(e) = run(args).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Create(create) => create.run().await,
        Command::Delete(delete) => delete.run().await,
        Command::Get(get) => get.run().await,
        Command::WaitNodes(wait_nodes) => wait_nodes.run().await,
    }
}

/// Converts a workflow error, adding how to clean up when resources were left behind.
pub(crate) fn workflow_error(
    error: eksflow_orchestrator::Error,
    region: &str,
    name: Option<&str>,
) -> anyhow::Error {
    let resources = error.resources();
    if !resources.needs_cleanup() {
        return error.into();
    }
    anyhow!(
        "{}\n{}. To remove them, run: eksflow delete cluster --region={} {}",
        error,
        resources,
        region,
        name.unwrap_or("<NAME>")
    )
}

/// Initialize the logger with the value passed by `--log-level` (or its default) when the
/// `RUST_LOG` environment variable is not present. If present, the `RUST_LOG` environment variable
/// overrides `--log-level`/`level`.
fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; use the given level for the workspace crates only.
            let mut builder = Builder::new();
            builder.filter_level(LevelFilter::Error);
            for target in LOG_TARGETS {
                builder.filter(Some(target), level);
            }
            builder.init();
        }
    }
}

//! Main entry point for the Drug Interaction Explainer

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drug_explainer::cli::commands::{self, Commands};
use drug_explainer::ExplainerConfig;

/// Drug Interaction Explainer - simplify interaction descriptions and show UMLS codes
#[derive(Parser, Debug)]
#[command(name = "drug-explainer", version, about, long_about = None)]
struct Args {
    /// Interaction table (defaults to DATASET_PATH env var)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// JSON or YAML configuration file (overrides environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    let default_filter = format!("{}={}", env!("CARGO_CRATE_NAME"), log_level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ExplainerConfig::load(args.config.as_deref())?;
    if let Some(dataset) = args.dataset {
        config.dataset_path = dataset;
    }

    // Execute command
    match args.command {
        Some(Commands::Serve { host, port }) => {
            commands::handle_serve(&config, host, port).await?;
        }
        Some(Commands::Pairs) => {
            commands::handle_pairs(&config).await?;
        }
        Some(Commands::Show {
            pair,
            no_simplify,
            definitions,
        }) => {
            commands::handle_show(&config, pair, no_simplify, definitions).await?;
        }
        Some(Commands::Simplify { text }) => {
            commands::handle_simplify(&config, text).await?;
        }
        Some(Commands::Define { cui }) => {
            commands::handle_define(&config, cui).await?;
        }
        None => {
            println!("Please specify a command. Use --help for more information.");
        }
    }

    Ok(())
}

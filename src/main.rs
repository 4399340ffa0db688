//! # Lake Relay CLI (`relay`)
//!
//! The `relay` binary drives both halves of the system: the
//! query-transform-load pipeline (`relay etl`) and the scan-and-stage
//! ingestion that feeds the catalog (`relay stage`).
//!
//! ## Usage
//!
//! ```bash
//! relay --config ./config/relay.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `relay etl` | Run the pipeline over every entity kind |
//! | `relay etl --only billing` | Run the pipeline for one entity kind |
//! | `relay stage reports` | Scan one configured source and stage it to S3 |
//! | `relay stage all` | Stage every configured source |
//! | `relay sources` | List entity kinds and stage sources |
//!
//! Credentials come from the environment: `AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`, optional `AWS_SESSION_TOKEN`, and
//! `MYSQL_PASSWORD` for the relational target. A missing credential or an
//! unreadable config file ends the process with a non-zero status before
//! any entity kind is touched; failures inside the run are logged and never
//! change the exit status.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use lake_relay::athena::AthenaClient;
use lake_relay::aws::AwsCredentials;
use lake_relay::config::{load_config, Config};
use lake_relay::dynamo::DynamoClient;
use lake_relay::loader::MySqlLoader;
use lake_relay::pipeline::{run_pipeline, EntityKind};
use lake_relay::s3::S3Client;
use lake_relay::{logging, sources, stage};

/// Lake Relay — relay per-tenant operational records from a data-lake
/// catalog into MySQL.
#[derive(Parser)]
#[command(
    name = "relay",
    about = "Relay per-tenant operational records from a data-lake catalog into MySQL",
    version,
    long_about = "Lake Relay submits catalog queries per entity kind, waits for them within a \
    bounded poll budget, fetches the CSV results from S3, applies per-entity transformation \
    rules, and loads the records into MySQL with per-record failure isolation. It also ships \
    the staging side: scanning wide-column source tables page by page into S3 for the catalog \
    to query."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/relay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the query-transform-load pipeline.
    ///
    /// Processes entity kinds sequentially; a kind that fails or times out
    /// is logged and skipped, and the run continues with the next one.
    Etl {
        /// Process a single entity kind (reports, billing, inventory,
        /// order, productos) instead of all of them.
        #[arg(long)]
        only: Option<EntityKind>,
    },

    /// Scan a wide-column source table and stage it into S3 page by page.
    ///
    /// Source format: a name from `[stage.<name>]` in the config, or `all`.
    Stage {
        /// Stage source name, or `all`.
        source: String,
    },

    /// List configured entity kinds and stage sources.
    Sources,
}

#[tokio::main]
async fn main() {
    logging::init("info");

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("fatal error, exiting: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Etl { only } => run_etl(&config, only).await,
        Commands::Stage { source } => {
            let creds = AwsCredentials::from_env()?;
            let dynamo = DynamoClient::new(config.aws.region.clone(), creds.clone());
            let store = S3Client::new(config.aws.region.clone(), creds);
            stage::run_stage(&config, &dynamo, &store, &source).await
        }
        Commands::Sources => {
            sources::list_sources(&config);
            Ok(())
        }
    }
}

async fn run_etl(config: &Config, only: Option<EntityKind>) -> Result<()> {
    // Precondition checks happen here, before the per-kind loop; nothing
    // past this point ends the process early.
    let creds = AwsCredentials::from_env()?;
    let mysql_password =
        std::env::var("MYSQL_PASSWORD").context("MYSQL_PASSWORD environment variable not set")?;

    let catalog = AthenaClient::new(config.aws.region.clone(), creds.clone());
    let store = S3Client::new(config.aws.region.clone(), creds);
    let sink = MySqlLoader::new(&config.mysql, &mysql_password);

    let outcomes = run_pipeline(config, &catalog, &store, &sink, only).await;

    info!(kinds = outcomes.len(), "relay run completed");
    Ok(())
}

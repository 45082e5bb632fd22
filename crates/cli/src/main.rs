//! Quarry CLI
//!
//! Loads an ORM configuration and inspects what it does: validation, shard
//! routing and replica discovery.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quarry_orm::OrmConfig;
use quarry_orm::expr::Op;
use quarry_orm::replica::{Dsn, SystemResolver, discover};
use quarry_orm::sharding::{Algorithm, DataSource, HashSharding};
use tracing::info;

/// Inspect a quarry ORM configuration.
#[derive(Debug, Parser)]
#[command(name = "quarry", version, about)]
struct Cli {
    /// Configuration file (JSON).
    #[arg(short, long, env = "QUARRY_CONFIG")]
    config: PathBuf,

    /// Log level.
    #[arg(long, env = "QUARRY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate the configuration.
    Check,
    /// Print the shard targeted by `sharding_key = <value>`.
    Route {
        /// Value of the sharding key.
        value: i64,
    },
    /// Print every shard of the configured scheme.
    Broadcast,
    /// Resolve the replica DSN and print the discovered replicas.
    Replicas,
}

fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quarry_orm={level},quarry={level}")));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn sharding(config: &OrmConfig) -> anyhow::Result<HashSharding> {
    let sharding = config
        .sharding
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no sharding scheme configured"))?;
    Ok(sharding.build()?)
}

fn print_targets(targets: impl IntoIterator<Item = DataSource>) {
    for target in targets {
        println!("{target}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = OrmConfig::from_file(&cli.config)?;
    config.validate()?;
    info!(config = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Command::Check => {
            println!("connection:   {}", config.connection);
            println!("dialect:      {:?}", config.dialect);
            println!("materializer: {:?}", config.materializer);
            if let Some(timeout) = config.default_timeout {
                println!("timeout:      {timeout:?}");
            }
            match &config.sharding {
                Some(sharding) => println!(
                    "sharding:     {} over {} x {}",
                    sharding.sharding_key,
                    sharding.database.names().len(),
                    sharding.table.names().len()
                ),
                None => println!("sharding:     off"),
            }
            match &config.replicas {
                Some(replicas) => println!("replicas:     {}", replicas.dsn),
                None => println!("replicas:     off"),
            }
            println!("interceptors: {:?}", config.interceptors);
        }
        Command::Route { value } => {
            let algorithm = sharding(&config)?;
            print_targets(algorithm.sharding(Op::Eq, value)?);
        }
        Command::Broadcast => {
            print_targets(sharding(&config)?.broadcast());
        }
        Command::Replicas => {
            let replicas = config
                .replicas
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("no replicas configured"))?;
            let dsn = Dsn::parse(&replicas.dsn)?;
            let found = discover(&dsn, &SystemResolver, replicas.timeout).await?;
            info!(domain = %dsn.host(), replicas = found.len(), "Replicas resolved");
            for dsn in found {
                println!("{dsn}");
            }
        }
    }

    Ok(())
}

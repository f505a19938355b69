use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use execwatch::config::{Config, LoggingConfig};

#[derive(Parser)]
#[command(
    name = "execwatch",
    about = "Interface execution monitoring dashboard backend",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + rollup refresher)
    Serve {
        /// Bind address, overrides the config file
        #[arg(long)]
        bind: Option<String>,

        /// SQLite database path, overrides the config file
        #[arg(long)]
        db: Option<String>,
    },

    /// Fill the database with synthetic executions
    Seed {
        /// Number of records to generate
        #[arg(long, default_value = "500000")]
        count: usize,

        /// Records per insert transaction
        #[arg(long, default_value = "1000")]
        batch_size: usize,

        /// SQLite database path, overrides the config file
        #[arg(long)]
        db: Option<String>,
    },
}

fn env_filter(default_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
}

/// Resolve the config under a plain subscriber so the loader's own
/// messages are not lost before logging is configured.
fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .finish();
    tracing::subscriber::with_default(bootstrap, || Config::resolve(explicit))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = env_filter(&logging.level);

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = resolve_config(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind, db } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(db) = db {
                config.server.db_path = db;
            }
            tracing::info!(bind = %config.server.bind, "Starting execwatch daemon");
            execwatch::serve(config).await?;
        }
        Commands::Seed {
            count,
            batch_size,
            db,
        } => {
            let db_path = db.unwrap_or(config.server.db_path);
            let store = execwatch::open_store(&db_path)?;
            let inserted = execwatch::seed::run(store.as_ref(), count, batch_size).await;

            println!("Seeded {} of {} executions into {}", inserted, count, db_path);
            if inserted < count {
                anyhow::bail!("{} records failed to insert", count - inserted);
            }
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use dealflow::config::{CONFIG_DIR, DealflowConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "dealflow")]
#[command(version, about = "Sales pipeline CRM with an optimistic kanban board")]
pub struct Cli {
    /// Debug-level logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding dealflow.toml
    #[arg(long, global = true, default_value = CONFIG_DIR)]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the CRM server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (bind 0.0.0.0, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database schema and seed the pipeline catalog
    Init {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Print the kanban board of a pipeline
    Board {
        /// Pipeline id
        #[arg(short, long)]
        pipeline: i64,
    },
    /// Move a deal to another stage and print the reconciled board
    Move {
        /// Deal id
        deal: i64,

        /// Target stage id
        stage: i64,

        /// Loss reason, recorded when the target stage loses the deal
        #[arg(long)]
        reason: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("dealflow=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("dealflow=info,tower_http=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = DealflowConfig::load_or_default(&cli.config_dir)?;
    config.apply_env()?;

    match cli.command {
        Commands::Serve { port, db_path, dev } => {
            cmd::cmd_serve(&config, port, db_path, dev).await?;
        }
        Commands::Init { db_path } => cmd::cmd_init(&config, db_path)?,
        Commands::Board { pipeline } => cmd::cmd_board(&config, pipeline).await?,
        Commands::Move {
            deal,
            stage,
            reason,
        } => cmd::cmd_move(&config, deal, stage, reason).await?,
    }

    Ok(())
}

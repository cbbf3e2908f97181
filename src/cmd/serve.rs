//! Server lifecycle commands: `dealflow serve` and `dealflow init`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use dealflow::config::DealflowConfig;
use dealflow::crm::server::{self, ServerConfig};

fn server_config(config: &DealflowConfig, db_path: Option<PathBuf>) -> ServerConfig {
    let mut server = config.server_config();
    if let Some(db_path) = db_path {
        server.db_path = db_path;
    }
    server
}

pub async fn cmd_serve(
    config: &DealflowConfig,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
) -> Result<()> {
    let mut server = server_config(config, db_path);
    if let Some(port) = port {
        server.port = port;
    }
    server.dev_mode |= dev;
    server::start_server(server).await
}

pub fn cmd_init(config: &DealflowConfig, db_path: Option<PathBuf>) -> Result<()> {
    let server = server_config(config, db_path);
    let db = server::open_database(&server)?;

    println!(
        "{} Database initialized at {}",
        console::style("✓").green(),
        server.db_path.display()
    );
    for pipeline in db.list_pipelines().context("Failed to list pipelines")? {
        let stages = db
            .list_stages(pipeline.id)
            .with_context(|| format!("Failed to list stages of pipeline {}", pipeline.id))?;
        println!(
            "  {} {} ({} stages)",
            console::style(format!("#{}", pipeline.id)).dim(),
            pipeline.name,
            stages.len()
        );
    }
    Ok(())
}

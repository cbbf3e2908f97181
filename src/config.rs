//! Configuration read from `.dealflow/dealflow.toml`.
//!
//! Layered: file → environment (`DEALFLOW_*`) → CLI flags. Every field has a
//! default, so an absent file is the same as an empty one.
//!
//! ```toml
//! [server]
//! port = 3141
//! db_path = ".dealflow/dealflow.db"
//! dev_mode = false
//!
//! [auth]
//! tokens = ["team-token"]
//!
//! [client]
//! base_url = "http://127.0.0.1:3141"
//! token = "team-token"
//! move_timeout_secs = 10
//!
//! [deals]
//! default_currency = "RUB"
//!
//! [[pipelines]]
//! name = "Partners"
//!
//! [[pipelines.stages]]
//! name = "Intro"
//! sort_order = 0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dealflow_common::CreatePipelineRequest;
use serde::{Deserialize, Serialize};

use crate::crm::server::ServerConfig;
use crate::crm::{catalog, validate};

pub const CONFIG_DIR: &str = ".dealflow";
pub const CONFIG_FILE: &str = "dealflow.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Bind on all interfaces and allow any CORS origin.
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_port() -> u16 {
    3141
}

fn default_db_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("dealflow.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: default_db_path(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSection {
    /// Accepted bearer tokens. Empty disables authentication.
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Upper bound on how long the board waits for a move to resolve.
    #[serde(default = "default_move_timeout_secs")]
    pub move_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3141".to_string()
}

fn default_move_timeout_secs() -> u64 {
    10
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            move_timeout_secs: default_move_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealsSection {
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_currency() -> String {
    "RUB".to_string()
}

impl Default for DealsSection {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealflowConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub deals: DealsSection,
    /// Seed catalog for an empty database.
    #[serde(default)]
    pub pipelines: Vec<CreatePipelineRequest>,
}

impl DealflowConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse and check configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse dealflow.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `dealflow.toml` from `config_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        validate::currency(&self.deals.default_currency)
            .context("Invalid [deals] default_currency")?;
        if self.client.move_timeout_secs == 0 {
            anyhow::bail!("[client] move_timeout_secs must be greater than 0");
        }
        for pipeline in &self.pipelines {
            catalog::validate_pipeline(pipeline)
                .with_context(|| format!("Invalid seed pipeline '{}'", pipeline.name))?;
        }
        Ok(())
    }

    /// Apply `DEALFLOW_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (tests pass a map).
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("DEALFLOW_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid DEALFLOW_PORT '{}'", port))?;
        }
        if let Some(path) = lookup("DEALFLOW_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(tokens) = lookup("DEALFLOW_API_TOKENS") {
            self.auth.tokens = tokens
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(url) = lookup("DEALFLOW_URL") {
            self.client.base_url = url;
        }
        if let Some(token) = lookup("DEALFLOW_TOKEN") {
            self.client.token = Some(token).filter(|t| !t.is_empty());
        }
        Ok(())
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs(self.client.move_timeout_secs)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.server.port,
            db_path: self.server.db_path.clone(),
            dev_mode: self.server.dev_mode,
            api_tokens: self.auth.tokens.clone(),
            default_currency: self.deals.default_currency.clone(),
            seed_pipelines: self.pipelines.clone(),
        }
    }
}

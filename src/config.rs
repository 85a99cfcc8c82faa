use crate::classify::{ErrorTable, StatusRule};
use crate::credentials::KeySource;
use crate::llm::{ClientOption, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "CONTEXTGPT_CONFIG";
pub const RUN_ENV: &str = "CONTEXTGPT_ENV";
pub const DEFAULT_CONFIG_FILE: &str = "contextgpt.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
    #[serde(default)]
    pub error_rules: Vec<StatusRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_urls_file")]
    pub urls_file: PathBuf,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            urls_file: default_urls_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum CredentialsConfig {
    Env,
    SecretManager { project_id: String },
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_urls_file() -> PathBuf {
    PathBuf::from("urls.txt")
}

impl Config {
    /// Resolves the config file (`CONTEXTGPT_CONFIG`, then `./contextgpt.toml`,
    /// then built-in defaults) and applies environment overrides.
    pub fn load_auto() -> Result<Self> {
        let mut cfg = match Self::locate() {
            Some(path) => Self::load(&path)?,
            None => {
                tracing::debug!("No config file found, using defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(
                "{} points to non-existent file: {}",
                CONFIG_ENV,
                path.display()
            );
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let cfg = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse TOML from {}", path.display()))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(cfg)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            if !base_url.trim().is_empty() {
                self.api.base_url = base_url;
            }
        }
        if let Ok(raw) = env::var("CONTEXTGPT_TIMEOUT_SECS") {
            self.api.timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("CONTEXTGPT_TIMEOUT_SECS is not a number: {}", raw))?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn error_table(&self) -> ErrorTable {
        if self.error_rules.is_empty() {
            ErrorTable::default()
        } else {
            ErrorTable::new(self.error_rules.clone())
        }
    }

    pub fn client_options(&self) -> Vec<ClientOption> {
        vec![
            ClientOption::BaseUrl(self.api.base_url.clone()),
            ClientOption::Timeout(self.timeout()),
            ClientOption::ErrorTable(self.error_table()),
        ]
    }

    /// An explicit `[credentials]` section wins; otherwise `CONTEXTGPT_ENV`
    /// decides, with `production` reading from the secret manager.
    pub fn key_source(&self) -> Result<KeySource> {
        let run_env = env::var(RUN_ENV).unwrap_or_else(|_| "development".to_string());
        self.key_source_for(&run_env)
    }

    pub fn key_source_for(&self, run_env: &str) -> Result<KeySource> {
        match &self.credentials {
            Some(CredentialsConfig::Env) => Ok(KeySource::Env),
            Some(CredentialsConfig::SecretManager { project_id }) => Ok(KeySource::SecretManager {
                project_id: project_id.clone(),
            }),
            None if run_env == "development" => Ok(KeySource::Env),
            None => anyhow::bail!(
                "{}={} requires a [credentials] section with source = \"secret-manager\" and a project_id",
                RUN_ENV,
                run_env
            ),
        }
    }
}

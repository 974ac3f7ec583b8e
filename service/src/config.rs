//! Service configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then `CHURN_*`
//! environment variables. Command-line overrides are applied by the caller.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use churn_core::temporal::default_reference_date;
use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "churn.toml";

const ENV_PREFIX: &str = "CHURN";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub database_path: PathBuf,
    pub history_log_path: PathBuf,
    pub external_history_path: PathBuf,
    pub frontend_dir: PathBuf,
    pub reference_date: String,
    pub log_level: String,
    pub log_format: String,

    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl ServiceConfig {
    /// Load from the environment of this process
    pub fn load(config_path_override: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path_override, None)
    }

    /// Load with an explicit environment map in place of the process
    /// environment (keys still carry the `CHURN_` prefix)
    pub fn load_with_env(
        config_path_override: Option<&str>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path)
            }
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|path| path.exists()),
        };

        let mut builder = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5000)?
            .set_default("model_path", "models/churn_model.json")?
            .set_default("database_path", "base_clientes.csv")?
            .set_default("history_log_path", "historico_analises.csv")?
            .set_default("external_history_path", "historico.csv")?
            .set_default("frontend_dir", "frontend")?
            .set_default("reference_date", default_reference_date().to_string())?
            .set_default("log_level", "info")?
            .set_default("log_format", "pretty")?;

        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let mut config: ServiceConfig = builder
            .build()?
            .try_deserialize()
            .context("Invalid service configuration")?;
        config.config_path = resolved_path;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.reference_date()?;
        if self.host.trim().is_empty() {
            anyhow::bail!("host must not be empty");
        }
        Ok(())
    }

    /// Snapshot date of the customer store
    pub fn reference_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(self.reference_date.trim(), "%Y-%m-%d").with_context(|| {
            format!(
                "reference_date {:?} is not a YYYY-MM-DD date",
                self.reference_date
            )
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

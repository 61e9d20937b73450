//! Layered configuration and XDG path helpers.

use std::{env, path::PathBuf, time::Duration};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::jgrants::DEFAULT_API_BASE_URL;
use crate::portal::{DEFAULT_BASE_URL, DEFAULT_PREF_ID};

const CONFIG_FILE: &str = "config/settings";
/// Names an extra settings file layered above `config/settings`.
pub const CONFIG_FILE_ENV: &str = "HOJOKIN_CONFIG_FILE";
const ENV_PREFIX: &str = "HOJOKIN";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_TIMEOUT_SECS: i64 = 30;

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("unable to resolve project directories")]
    MissingProjectDirs,
    #[error(transparent)]
    Build(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub portal: PortalConfig,
    pub jgrants: JGrantsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub pref_id: u32,
    pub request_timeout_secs: u64,
}

impl PortalConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JGrantsConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl JGrantsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding scrape output files; also the local search corpus.
    pub data_dir: PathBuf,
}

/// Defaults, then `config/settings.*`, then `$HOJOKIN_CONFIG_FILE`, then
/// `HOJOKIN__SECTION__KEY` environment variables.
pub fn load() -> Result<AppConfig, AppConfigError> {
    let default_data_dir = default_data_dir()?;
    let mut builder = Config::builder()
        .set_default("server.listen_addr", DEFAULT_LISTEN_ADDR)?
        .set_default("portal.base_url", DEFAULT_BASE_URL)?
        .set_default("portal.pref_id", i64::from(DEFAULT_PREF_ID))?
        .set_default("portal.request_timeout_secs", DEFAULT_TIMEOUT_SECS)?
        .set_default("jgrants.base_url", DEFAULT_API_BASE_URL)?
        .set_default("jgrants.timeout_secs", DEFAULT_TIMEOUT_SECS)?
        .set_default(
            "storage.data_dir",
            default_data_dir.to_string_lossy().to_string(),
        )?
        .add_source(File::with_name(CONFIG_FILE).required(false));

    if let Some(path) = env::var_os(CONFIG_FILE_ENV).filter(|value| !value.is_empty()) {
        builder = builder.add_source(File::from(PathBuf::from(path)).required(true));
    }

    let cfg = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    Ok(cfg)
}

pub fn project_dirs() -> Result<ProjectDirs, AppConfigError> {
    ProjectDirs::from("jp", "hojokin", "hojokin").ok_or(AppConfigError::MissingProjectDirs)
}

fn default_data_dir() -> Result<PathBuf, AppConfigError> {
    Ok(project_dirs()?.data_dir().join("subsidies"))
}

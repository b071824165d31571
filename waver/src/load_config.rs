//! `load_config`: reads the YAML config file and injects secrets from the environment.
//!
//! The file carries two sections, `waver` (generation settings, see
//! [`WaverSettings`]) and `minio` (object store, see [`StoreSettings`]). API keys
//! and store credentials may be left out of the file and supplied through
//! the environment instead; a non-empty environment value always wins.
//!
//! Provider selection is not validated here. An unknown or missing
//! `llm-provider` only fails once a request is resolved.
//!
//! # Errors
//! All errors are `anyhow::Error` and surface at the CLI boundary.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::{debug, error, info};
use waver_core::config::{StoreSettings, WaverSettings};

pub const OPENAI_API_KEY_ENV: &str = "WAVER_OPENAI_API_KEY";
pub const GEMINI_API_KEY_ENV: &str = "WAVER_GEMINI_API_KEY";
pub const STORE_ACCESS_KEY_ENV: &str = "MINIO_ACCESS_KEY";
pub const STORE_SECRET_KEY_ENV: &str = "MINIO_SECRET_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct WaverFileConfig {
    #[serde(default)]
    pub waver: WaverSettings,
    pub minio: StoreSettings,
}

/// Load the config file at `path` and apply environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<WaverFileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let mut config: WaverFileConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Whether the config file at `path` asks for verbose output.
///
/// Read before logging is set up, so it stays silent and treats any problem
/// as `false`; [`load_config`] reports the real error later.
pub fn config_verbose(path: &Path) -> bool {
    #[derive(Deserialize)]
    struct Peek {
        #[serde(default)]
        waver: PeekWaver,
    }
    #[derive(Default, Deserialize)]
    struct PeekWaver {
        #[serde(default)]
        verbose: bool,
    }

    fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_yaml::from_str::<Peek>(&content).ok())
        .is_some_and(|peek| peek.waver.verbose)
}

fn apply_env_overrides(config: &mut WaverFileConfig) {
    if let Some(key) = env_value(OPENAI_API_KEY_ENV) {
        debug!(var = OPENAI_API_KEY_ENV, "Using OpenAI API key from environment");
        config.waver.openai.api_key = Some(key);
    }
    if let Some(key) = env_value(GEMINI_API_KEY_ENV) {
        debug!(var = GEMINI_API_KEY_ENV, "Using Gemini API key from environment");
        config.waver.gemini.api_key = Some(key);
    }
    if let Some(key) = env_value(STORE_ACCESS_KEY_ENV) {
        debug!(var = STORE_ACCESS_KEY_ENV, "Using object store access key from environment");
        config.minio.access_key = key;
    }
    if let Some(key) = env_value(STORE_SECRET_KEY_ENV) {
        debug!(var = STORE_SECRET_KEY_ENV, "Using object store secret key from environment");
        config.minio.secret_key = key;
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

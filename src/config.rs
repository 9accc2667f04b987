//! Service configuration, built from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default API key, matching the long-standing deployment default.
/// Override with `EMAIL_CLASSIFIER_API_KEY` in any real deployment.
const DEFAULT_API_KEY: &str = "sk-emailclassifier-2024-prod";

/// An API key paired with the client name it identifies.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub client: String,
    pub key: SecretString,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Directory holding the seven model artifacts.
    pub model_dir: PathBuf,
    /// Valid API keys.
    pub api_keys: Vec<ApiKey>,
    /// Maximum emails accepted per batch request.
    pub max_batch: usize,
}

impl ServiceConfig {
    /// Build config from environment variables. Everything has a default;
    /// malformed values are startup errors rather than silent fallbacks.
    ///
    /// - `EMAIL_CLASSIFIER_BIND` — bind address (default `0.0.0.0:5001`)
    /// - `EMAIL_CLASSIFIER_MODEL_DIR` — artifact directory (default `./models`)
    /// - `EMAIL_CLASSIFIER_API_KEY` — the `default` client's key
    /// - `EMAIL_CLASSIFIER_API_KEYS` — extra `client:key` pairs, comma separated
    /// - `EMAIL_CLASSIFIER_MAX_BATCH` — batch cap (default 100)
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr: SocketAddr = std::env::var("EMAIL_CLASSIFIER_BIND")
            .unwrap_or_else(|_| "0.0.0.0:5001".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "EMAIL_CLASSIFIER_BIND".into(),
                message: format!("{e}"),
            })?;

        let model_dir = std::env::var("EMAIL_CLASSIFIER_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./models"));

        let default_key = std::env::var("EMAIL_CLASSIFIER_API_KEY")
            .unwrap_or_else(|_| DEFAULT_API_KEY.to_string());
        let mut api_keys = vec![ApiKey {
            client: "default".to_string(),
            key: SecretString::from(default_key),
        }];

        if let Ok(extra) = std::env::var("EMAIL_CLASSIFIER_API_KEYS") {
            for entry in extra.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let (client, key) =
                    entry
                        .split_once(':')
                        .ok_or_else(|| ConfigError::InvalidValue {
                            key: "EMAIL_CLASSIFIER_API_KEYS".into(),
                            message: format!("expected client:key pair, got {entry:?}"),
                        })?;
                api_keys.push(ApiKey {
                    client: client.trim().to_string(),
                    key: SecretString::from(key.trim().to_string()),
                });
            }
        }

        let max_batch: usize = match std::env::var("EMAIL_CLASSIFIER_MAX_BATCH") {
            Ok(s) => s.parse().map_err(|e| ConfigError::InvalidValue {
                key: "EMAIL_CLASSIFIER_MAX_BATCH".into(),
                message: format!("{e}"),
            })?,
            Err(_) => 100,
        };

        Ok(Self {
            bind_addr,
            model_dir,
            api_keys,
            max_batch,
        })
    }
}

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::infra::{
    config::{file_config::FileConfig, AppConfig},
    error::AppError,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Overrides `api.base_url` when set to a non-empty value.
pub const API_URL_ENV: &str = "CONVOO_API_URL";

pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = AppConfig::default();

    if config_path.exists() {
        let raw = fs::read_to_string(&config_path).map_err(|source| AppError::ConfigRead {
            path: config_path.clone(),
            source,
        })?;

        let file_config: FileConfig =
            toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
                path: config_path,
                source,
            })?;

        file_config.merge_into(&mut config);
    }

    if let Some(base_url) = env::var(API_URL_ENV).ok().filter(|value| !value.trim().is_empty()) {
        config.api.base_url = base_url.trim().to_owned();
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), AppError> {
    reqwest::Url::parse(&config.api.base_url).map_err(|error| AppError::ConfigValue {
        field: "api.base_url",
        details: error.to_string(),
    })?;

    if config.sync.poll_interval_ms == 0 {
        return Err(AppError::ConfigValue {
            field: "sync.poll_interval_ms",
            details: "must be greater than zero".to_owned(),
        });
    }

    if config.api.request_timeout_ms == 0 {
        return Err(AppError::ConfigValue {
            field: "api.request_timeout_ms",
            details: "must be greater than zero".to_owned(),
        });
    }

    Ok(())
}

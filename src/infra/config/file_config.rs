use serde::Deserialize;

use crate::infra::config::{ApiConfig, AppConfig, LogConfig, SyncConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub api: Option<FileApiConfig>,
    pub sync: Option<FileSyncConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(api) = self.api {
            api.merge_into(&mut config.api);
        }

        if let Some(sync) = self.sync {
            sync.merge_into(&mut config.sync);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub to_file: Option<bool>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(to_file) = self.to_file {
            config.to_file = to_file;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileApiConfig {
    pub base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl FileApiConfig {
    fn merge_into(self, config: &mut ApiConfig) {
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }

        if let Some(timeout_ms) = self.request_timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileSyncConfig {
    pub poll_interval_ms: Option<u64>,
    pub page_size: Option<u32>,
    pub refresh_delay_ms: Option<u64>,
}

impl FileSyncConfig {
    fn merge_into(self, config: &mut SyncConfig) {
        if let Some(interval_ms) = self.poll_interval_ms {
            config.poll_interval_ms = interval_ms;
        }

        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }

        if let Some(delay_ms) = self.refresh_delay_ms {
            config.refresh_delay_ms = delay_ms;
        }
    }
}

mod app_config;
mod file_config;
mod loader;

pub use app_config::{ApiConfig, AppConfig, LogConfig, SyncConfig};
pub use loader::load;

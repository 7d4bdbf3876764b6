use std::path::Path;

use crate::{
    api,
    infra::{self, error::AppError, storage_layout::StorageLayout},
    usecases::context::AppContext,
};

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let layout = StorageLayout::resolve()?;
    let mut context = build_context(config_path, layout)?;
    let guard = infra::logging::init(&context.config.logging, &context.layout.log_dir)?;
    context.keep_log_guard(guard);

    tracing::debug!(
        config_dir = %context.layout.config_dir.display(),
        base_url = %context.config.api.base_url,
        "application context ready"
    );
    Ok(context)
}

fn build_context(config_path: Option<&Path>, layout: StorageLayout) -> Result<AppContext, AppError> {
    let config = infra::config::load(config_path)?;
    layout.ensure_dirs()?;
    let runtime = api::build_runtime()?;

    Ok(AppContext::new(config, layout, runtime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{infra::config::AppConfig, test_support::env_lock};

    #[test]
    fn builds_context_with_default_config_when_file_is_missing() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = StorageLayout::under(dir.path().join("convoo"));

        let context = build_context(Some(Path::new("./missing-config.toml")), layout)
            .expect("context should build from defaults");

        let defaults = AppConfig::default();
        assert_eq!(context.config.sync, defaults.sync);
        assert_eq!(context.config.logging, defaults.logging);
        assert!(context.layout.session_dir.is_dir());
        assert!(context.sessions.path().starts_with(dir.path()));
    }

    #[test]
    fn require_session_reports_missing_login() {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = StorageLayout::under(dir.path().join("convoo"));
        let context = build_context(Some(Path::new("./missing-config.toml")), layout)
            .expect("context should build");

        assert!(matches!(
            context.require_session(),
            Err(AppError::NotAuthenticated)
        ));
    }
}

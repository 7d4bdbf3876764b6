use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    api::ApiAdapter,
    domain::session::SessionContext,
    infra::{
        config::AppConfig, error::AppError, session_store::SessionStore,
        storage_layout::StorageLayout,
    },
};

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub layout: StorageLayout,
    pub sessions: SessionStore,
    pub runtime: Arc<Runtime>,
    log_guard: Option<WorkerGuard>,
}

impl AppContext {
    pub fn new(config: AppConfig, layout: StorageLayout, runtime: Arc<Runtime>) -> Self {
        let sessions = SessionStore::new(layout.session_file());
        Self {
            config,
            layout,
            sessions,
            runtime,
            log_guard: None,
        }
    }

    pub fn keep_log_guard(&mut self, guard: Option<WorkerGuard>) {
        self.log_guard = guard;
    }

    /// Saved session, or `AppError::NotAuthenticated` when nobody is logged in.
    pub fn require_session(&self) -> Result<SessionContext, AppError> {
        self.sessions.load()?.ok_or(AppError::NotAuthenticated)
    }

    pub fn api(&self, session: Option<&SessionContext>) -> Result<ApiAdapter, AppError> {
        let adapter = ApiAdapter::new(&self.config.api, Arc::clone(&self.runtime))?;
        Ok(match session {
            Some(session) => adapter.with_token(session.token.clone()),
            None => adapter,
        })
    }
}

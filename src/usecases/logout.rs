use crate::infra::{error::AppError, session_store::SessionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOutcome {
    pub session_removed: bool,
}

/// Forgets the saved session. The server keeps no session state, so this is local only.
pub fn logout(sessions: &SessionStore) -> Result<LogoutOutcome, AppError> {
    let session_removed = sessions.clear()?;
    tracing::info!(session_removed, "logout completed");

    Ok(LogoutOutcome { session_removed })
}

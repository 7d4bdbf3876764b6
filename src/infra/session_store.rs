//! Persisted login session: a small TOML file next to the rest of the
//! application state. Writes go through a temporary file and a rename so a
//! crash never leaves a half-written token behind.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        session::{AuthToken, SessionContext},
        user::UserId,
    },
    infra::error::AppError,
};

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no session was saved yet.
    pub fn load(&self) -> Result<Option<SessionContext>, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AppError::SessionRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let stored: StoredSession =
            toml::from_str(&raw).map_err(|error| AppError::SessionCorrupted {
                path: self.path.clone(),
                details: error.message().to_owned(),
            })?;

        if stored.token.trim().is_empty() {
            return Err(AppError::SessionCorrupted {
                path: self.path.clone(),
                details: "token is empty".to_owned(),
            });
        }

        Ok(Some(SessionContext::new(
            AuthToken::new(stored.token),
            stored.user_id.filter(|id| !id.is_empty()).map(UserId),
        )))
    }

    pub fn save(&self, session: &SessionContext) -> Result<(), AppError> {
        let stored = StoredSession {
            token: session.token.expose().to_owned(),
            user_id: session.user_id.as_ref().map(|id| id.as_str().to_owned()),
        };
        let raw = toml::to_string(&stored).map_err(|error| AppError::SessionWrite {
            path: self.path.clone(),
            source: std::io::Error::new(ErrorKind::InvalidData, error),
        })?;

        let tmp_path = self.path.with_extension("toml.tmp");
        let write_error = |source| AppError::SessionWrite {
            path: self.path.clone(),
            source,
        };

        let mut file = fs::File::create(&tmp_path).map_err(write_error)?;
        file.write_all(raw.as_bytes()).map_err(write_error)?;
        file.sync_all().map_err(write_error)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(write_error)?;
        tracing::debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    /// Returns whether a session file was removed.
    pub fn clear(&self) -> Result<bool, AppError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(AppError::SessionWrite {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("session.toml"))
    }

    #[test]
    fn load_returns_none_when_file_is_missing() {
        let dir = tempfile::tempdir().expect("temp dir");

        assert_eq!(store_in(&dir).load().expect("load should succeed"), None);
    }

    #[test]
    fn save_then_load_keeps_token_and_user_id() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        let session = SessionContext::new(AuthToken::new("tok"), Some(UserId("u1".to_owned())));

        store.save(&session).expect("save should succeed");

        assert_eq!(store.load().expect("load should succeed"), Some(session));
        assert!(!dir.path().join("session.toml.tmp").exists());
    }

    #[test]
    fn session_without_user_id_loads() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        fs::write(store.path(), "token = \"tok\"\n").expect("write session");

        let session = store.load().expect("load should succeed").expect("session");

        assert_eq!(session.user_id, None);
        assert_eq!(session.token.expose(), "tok");
    }

    #[test]
    fn empty_token_is_reported_as_corrupted() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        fs::write(store.path(), "token = \"  \"\n").expect("write session");

        let error = store.load().expect_err("must fail");

        assert!(matches!(error, AppError::SessionCorrupted { .. }));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        store
            .save(&SessionContext::new(AuthToken::new("tok"), None))
            .expect("save should succeed");

        assert!(store.clear().expect("first clear"));
        assert!(!store.clear().expect("second clear"));
    }
}

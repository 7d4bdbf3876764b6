use thiserror::Error;

/// Failure reported by the HTTP collaborator before any use-case mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Transport failure: connect, timeout, broken body.
    Network(String),
    /// Non-success status, with the server-provided message when there was one.
    Rejected { status: u16, message: Option<String> },
    /// No bearer token available for an authenticated call.
    MissingToken,
    /// Response body did not match the wire contract.
    InvalidData(String),
}

/// Input rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message text is empty")]
    EmptyMessage,
    #[error("phone number must be exactly 10 digits")]
    InvalidPhone,
    #[error("verification code must be exactly 4 digits")]
    InvalidOtp,
    #[error("search query must contain at least one digit")]
    EmptyQuery,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("not logged in or session expired; run `convoo login`")]
    Unauthorized,
    #[error("unexpected server response: {0}")]
    InvalidData(String),
}

impl From<SourceError> for FetchError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::Network(details) => Self::Network(details),
            SourceError::Rejected { status: 401, .. } | SourceError::MissingToken => {
                Self::Unauthorized
            }
            SourceError::Rejected { status, message } => Self::Api {
                status,
                message: message.unwrap_or_else(|| "no details".to_owned()),
            },
            SourceError::InvalidData(details) => Self::InvalidData(details),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a message is already being sent")]
    AlreadySending,
    #[error("no conversation is open")]
    NotReady,
    #[error(transparent)]
    Request(#[from] FetchError),
}

use thiserror::Error;

use crate::backend::BackendKind;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} service is not connected")]
    Unavailable { kind: BackendKind },

    #[error("{0}")]
    Backend(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unknown kind: {0}")]
    UnknownKind(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

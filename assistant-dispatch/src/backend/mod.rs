//! Remote analysis backends.
//!
//! Every backend is reached through the same [`AnalysisBackend`] trait. The
//! concrete HTTP clients differ only in their request/response codec.

pub mod alzheimer;
pub mod chat;
pub mod eeg;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    config::BackendEndpoint,
    error::{DispatchError, Result},
    upload::UploadedFile,
};

pub use alzheimer::{AlzheimerBackend, AlzheimerPrediction};
pub use chat::ChatBackend;
pub use eeg::{EegBackend, EegPrediction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Chat,
    Eeg,
    Alzheimer,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Chat => "chat",
            BackendKind::Eeg => "eeg",
            BackendKind::Alzheimer => "alzheimer",
        }
    }

    pub fn all() -> [BackendKind; 3] {
        [BackendKind::Chat, BackendKind::Eeg, BackendKind::Alzheimer]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Chat => "AI Assistant",
            BackendKind::Eeg => "EEG Analysis",
            BackendKind::Alzheimer => "Alzheimer Analysis",
        }
    }
}

impl FromStr for BackendKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chat" => Ok(BackendKind::Chat),
            "eeg" => Ok(BackendKind::Eeg),
            "alzheimer" => Ok(BackendKind::Alzheimer),
            _ => Err(DispatchError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Payload handed to a backend call
#[derive(Debug, Clone)]
pub enum BackendRequest {
    Chat(String),
    Upload(UploadedFile),
}

/// Decoded backend response
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    Chat(String),
    Eeg(Vec<EegPrediction>),
    Alzheimer(AlzheimerPrediction),
}

/// Core trait implemented by every remote analysis service.
///
/// The endpoint is passed on each call rather than stored, so the owner can
/// reconfigure a backend without rebuilding it.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Lightweight health check. `Ok(())` means the routing branch may be used.
    async fn probe(&self, endpoint: &BackendEndpoint) -> Result<()>;

    async fn call(&self, endpoint: &BackendEndpoint, request: BackendRequest)
    -> Result<BackendReply>;
}

/// The three backends a dispatcher routes between.
#[derive(Clone)]
pub struct BackendSet {
    pub chat: Arc<dyn AnalysisBackend>,
    pub eeg: Arc<dyn AnalysisBackend>,
    pub alzheimer: Arc<dyn AnalysisBackend>,
}

impl BackendSet {
    /// HTTP clients for all three services sharing one connection pool.
    pub fn http() -> Self {
        let client = reqwest::Client::new();
        Self {
            chat: Arc::new(ChatBackend::new(client.clone())),
            eeg: Arc::new(EegBackend::new(client.clone())),
            alzheimer: Arc::new(AlzheimerBackend::new(client)),
        }
    }

    pub fn get(&self, kind: BackendKind) -> &Arc<dyn AnalysisBackend> {
        match kind {
            BackendKind::Chat => &self.chat,
            BackendKind::Eeg => &self.eeg,
            BackendKind::Alzheimer => &self.alzheimer,
        }
    }
}

/// Pulls a human readable message out of a failed response body.
///
/// Classifier services answer errors with `{"error": "..."}`; anything else
/// falls back to the supplied status text.
pub(crate) async fn error_from_response(response: reqwest::Response, fallback: String) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
    }

    match response.json::<ErrorBody>().await {
        Ok(ErrorBody { error: Some(error) }) => error,
        _ => fallback,
    }
}

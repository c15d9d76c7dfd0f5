use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::BackendKind;

pub const DEFAULT_CHAT_URL: &str = "http://localhost:5100";
pub const DEFAULT_EEG_URL: &str = "http://localhost:8002";
pub const DEFAULT_ALZHEIMER_URL: &str = "http://localhost:8000";
pub const DEFAULT_EEG_API_KEY: &str = "test-key";

/// Where a backend lives and how to authenticate against it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEndpoint {
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub credential: Option<String>,
}

impl BackendEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Joins `path` onto the base URL without doubling the slash.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Dispatcher configuration.
///
/// Owned by the dispatcher and only changed through
/// [`Dispatcher::reconfigure`](crate::Dispatcher::reconfigure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub chat: BackendEndpoint,
    pub eeg: BackendEndpoint,
    pub alzheimer: BackendEndpoint,
    /// Strip Markdown emphasis and headings from AI replies
    pub strip_markdown: bool,
    /// Fixed seed for predefined reply selection
    pub reply_seed: Option<u64>,
}

impl DispatcherConfig {
    /// Reads the configuration from environment variables, falling back to
    /// the local development ports for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let chat = BackendEndpoint::new(env_or("NEUROPATH_AI_API_URL", DEFAULT_CHAT_URL));

        let mut eeg = BackendEndpoint::new(env_or("NEUROPATH_EEG_API_URL", DEFAULT_EEG_URL));
        eeg.credential = Some(env_or("EEG_API_KEY", DEFAULT_EEG_API_KEY));

        let mut alzheimer =
            BackendEndpoint::new(env_or("NEUROPATH_ALZHEIMER_API_URL", DEFAULT_ALZHEIMER_URL));
        alzheimer.credential = std::env::var("ALZHEIMER_API_KEY").ok();
        if alzheimer.credential.is_none() {
            warn!("ALZHEIMER_API_KEY not set, Alzheimer predictions will be sent without a key");
        }

        let strip_markdown = std::env::var("NEUROPATH_STRIP_MARKDOWN")
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.strip_markdown);

        let reply_seed = std::env::var("NEUROPATH_REPLY_SEED")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        Self {
            chat,
            eeg,
            alzheimer,
            strip_markdown,
            reply_seed,
        }
    }

    pub fn endpoint(&self, kind: BackendKind) -> &BackendEndpoint {
        match kind {
            BackendKind::Chat => &self.chat,
            BackendKind::Eeg => &self.eeg,
            BackendKind::Alzheimer => &self.alzheimer,
        }
    }

    pub fn set_endpoint(&mut self, kind: BackendKind, endpoint: BackendEndpoint) {
        match kind {
            BackendKind::Chat => self.chat = endpoint,
            BackendKind::Eeg => self.eeg = endpoint,
            BackendKind::Alzheimer => self.alzheimer = endpoint,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            chat: BackendEndpoint::new(DEFAULT_CHAT_URL),
            eeg: BackendEndpoint::new(DEFAULT_EEG_URL).with_credential(DEFAULT_EEG_API_KEY),
            alzheimer: BackendEndpoint::new(DEFAULT_ALZHEIMER_URL),
            strip_markdown: true,
            reply_seed: None,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

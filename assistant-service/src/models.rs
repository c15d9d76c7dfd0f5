use assistant_dispatch::{
    BackendConnection, Dispatcher, Message, Notice, PendingUploadInfo, UploadKind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReconfigureRequest {
    pub base_url: String,
    pub credential: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AiToggleRequest {
    pub enabled: bool,
}

/// Full view of one conversation, used to render a chat window.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub is_typing: bool,
    pub ai_enabled: bool,
    pub connections: Vec<BackendConnection>,
    pub pending_uploads: Vec<PendingUploadInfo>,
}

impl SessionSnapshot {
    pub fn of(dispatcher: &Dispatcher) -> Self {
        Self {
            session_id: dispatcher.id().to_string(),
            messages: dispatcher.messages(),
            is_typing: dispatcher.is_typing(),
            ai_enabled: dispatcher.ai_enabled(),
            connections: dispatcher.connections(),
            pending_uploads: [UploadKind::Eeg, UploadKind::Alzheimer]
                .into_iter()
                .filter_map(|kind| dispatcher.pending_upload(kind))
                .collect(),
        }
    }
}

/// Result of a single user action on a session
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendStatusResponse {
    pub session_id: String,
    pub connection: BackendConnection,
    pub notices: Vec<Notice>,
}

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AnalysisBackend, BackendKind, BackendReply, BackendRequest};
use crate::{
    config::BackendEndpoint,
    error::{DispatchError, Result},
};

#[derive(Serialize)]
struct ChatRequest<'a> {
    user_message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    reply: String,
}

/// Client for the hosted chat-completion assistant.
#[derive(Clone)]
pub struct ChatBackend {
    client: Client,
}

impl ChatBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn send_message(&self, endpoint: &BackendEndpoint, message: &str) -> Result<String> {
        let url = endpoint.url("/chat");
        debug!(url = %url, message_len = message.len(), "Sending chat message");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest {
                user_message: message,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DispatchError::Backend(format!(
                "API request failed: {}",
                response.status().as_u16()
            )));
        }

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response.reply)
    }
}

#[async_trait]
impl AnalysisBackend for ChatBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Chat
    }

    async fn probe(&self, endpoint: &BackendEndpoint) -> Result<()> {
        let response = self.client.get(endpoint.url("/health")).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            warn!(status = %response.status(), "Chat health check failed");
            Err(DispatchError::Backend(format!(
                "Health check failed: {}",
                response.status().as_u16()
            )))
        }
    }

    async fn call(
        &self,
        endpoint: &BackendEndpoint,
        request: BackendRequest,
    ) -> Result<BackendReply> {
        match request {
            BackendRequest::Chat(message) => self
                .send_message(endpoint, &message)
                .await
                .map(BackendReply::Chat),
            BackendRequest::Upload(_) => Err(DispatchError::Validation(
                "Chat backend does not accept file uploads".to_string(),
            )),
        }
    }
}

use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AnalysisBackend, BackendKind, BackendReply, BackendRequest, error_from_response};
use crate::{
    config::BackendEndpoint,
    error::{DispatchError, Result},
    upload::UploadedFile,
};

/// One classified EEG record. 0 is normal, 1-4 are seizure subclasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EegPrediction {
    pub prediction: i64,
}

#[derive(Deserialize)]
struct EegResponse {
    #[serde(default)]
    results: Vec<EegPrediction>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// Client for the EEG seizure classifier.
#[derive(Clone)]
pub struct EegBackend {
    client: Client,
}

impl EegBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn predict_from_csv(
        &self,
        endpoint: &BackendEndpoint,
        file: &UploadedFile,
    ) -> Result<Vec<EegPrediction>> {
        let url = endpoint.url("/predict");
        debug!(url = %url, file_name = %file.file_name, size = file.bytes.len(), "Uploading EEG csv");

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(file.content_type.as_deref().unwrap_or("text/csv"))?;
        let form = Form::new().part("file", part);

        let mut request = self.client.post(&url).multipart(form);
        if let Some(api_key) = &endpoint.credential {
            request = request.header("x-api-key", api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message =
                error_from_response(response, format!("API request failed: {}", status.as_u16()))
                    .await;
            return Err(DispatchError::Backend(message));
        }

        let eeg_response: EegResponse = response.json().await?;
        if let Some(error) = eeg_response.error {
            return Err(DispatchError::Backend(error));
        }
        Ok(eeg_response.results)
    }
}

#[async_trait]
impl AnalysisBackend for EegBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Eeg
    }

    async fn probe(&self, endpoint: &BackendEndpoint) -> Result<()> {
        let response = self.client.get(endpoint.url("/api/health")).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "EEG health check failed");
            return Err(DispatchError::Backend(format!(
                "Health check failed: {}",
                response.status().as_u16()
            )));
        }

        let health: HealthResponse = response.json().await?;
        if health.status == "OK" {
            Ok(())
        } else {
            Err(DispatchError::Backend(format!(
                "Health check reported status {}",
                health.status
            )))
        }
    }

    async fn call(
        &self,
        endpoint: &BackendEndpoint,
        request: BackendRequest,
    ) -> Result<BackendReply> {
        match request {
            BackendRequest::Upload(file) => self
                .predict_from_csv(endpoint, &file)
                .await
                .map(BackendReply::Eeg),
            BackendRequest::Chat(_) => Err(DispatchError::Validation(
                "EEG backend only accepts csv uploads".to_string(),
            )),
        }
    }
}

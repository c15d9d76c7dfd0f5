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

/// MRI classification as returned by the Alzheimer's classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlzheimerPrediction {
    pub prediction: String,
    pub meaning: String,
}

/// Client for the Alzheimer's MRI classifier.
#[derive(Clone)]
pub struct AlzheimerBackend {
    client: Client,
}

impl AlzheimerBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn predict_from_image(
        &self,
        endpoint: &BackendEndpoint,
        image: &UploadedFile,
    ) -> Result<AlzheimerPrediction> {
        let url = endpoint.url("/predict");
        debug!(url = %url, file_name = %image.file_name, size = image.bytes.len(), "Uploading MRI image");

        let mut part = Part::bytes(image.bytes.clone()).file_name(image.file_name.clone());
        if let Some(content_type) = &image.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = Form::new().part("file", part);

        let mut request = self.client.post(&url).multipart(form);
        if let Some(api_key) = &endpoint.credential {
            request = request.header("x-api-key", api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let fallback = format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            );
            return Err(DispatchError::Backend(
                error_from_response(response, fallback).await,
            ));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AnalysisBackend for AlzheimerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Alzheimer
    }

    async fn probe(&self, endpoint: &BackendEndpoint) -> Result<()> {
        let response = self.client.get(endpoint.url("/")).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            warn!(status = %response.status(), "Alzheimer health check failed");
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
            BackendRequest::Upload(image) => self
                .predict_from_image(endpoint, &image)
                .await
                .map(BackendReply::Alzheimer),
            BackendRequest::Chat(_) => Err(DispatchError::Validation(
                "Alzheimer backend only accepts image uploads".to_string(),
            )),
        }
    }
}

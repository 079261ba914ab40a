//! The seam between the worker and the external service.
//!
//! The worker drives everything through [`ProcessingService`] so its
//! pipeline can be exercised against a scripted mock; [`InsarApi`] is
//! the production implementation.

use async_trait::async_trait;
use groundwatch_core::submission::SubmissionSpec;

use crate::api::{InsarApi, InsarApiError};
use crate::messages::StatusResponse;

/// Operations the pipeline needs from the radar-processing service.
#[async_trait]
pub trait ProcessingService: Send + Sync {
    /// Submit a processing request; returns the external handle.
    async fn submit(&self, spec: &SubmissionSpec) -> Result<String, InsarApiError>;

    /// Poll the current status of a submitted request.
    async fn status(&self, external_ref: &str) -> Result<StatusResponse, InsarApiError>;

    /// Ask the service to stop a queued or running request.
    async fn cancel(&self, external_ref: &str) -> Result<(), InsarApiError>;

    /// Fetch a result artifact's raw bytes.
    async fn download(&self, url: &str) -> Result<Vec<u8>, InsarApiError>;
}

#[async_trait]
impl ProcessingService for InsarApi {
    async fn submit(&self, spec: &SubmissionSpec) -> Result<String, InsarApiError> {
        let response = InsarApi::submit(self, spec).await?;
        Ok(response.id)
    }

    async fn status(&self, external_ref: &str) -> Result<StatusResponse, InsarApiError> {
        InsarApi::status(self, external_ref).await
    }

    async fn cancel(&self, external_ref: &str) -> Result<(), InsarApiError> {
        InsarApi::cancel(self, external_ref).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, InsarApiError> {
        InsarApi::download(self, url).await
    }
}

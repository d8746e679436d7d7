//! Dispatch Client
//!
//! Sends one `ProcessingRequest` to the processing service and classifies the
//! outcome. It performs exactly one attempt; retries happen through stream
//! redelivery, guarded by the claim taken before dispatch.

use super::protocol::{ENDPOINT_PROCESS, ProcessEnvelope};
use super::types::{DispatchAccepted, DispatchError};
use crate::config::TriggerConfig;
use crate::normalizer::types::ProcessingRequest;

use std::time::Duration;

#[derive(Clone)]
pub struct DispatchClient {
    process_url: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl DispatchClient {
    pub fn new(config: &TriggerConfig) -> Self {
        Self {
            process_url: format!("{}{}", config.processing_service_url, ENDPOINT_PROCESS),
            timeout: config.request_timeout,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn process_url(&self) -> &str {
        &self.process_url
    }

    pub async fn dispatch(
        &self,
        request: &ProcessingRequest,
    ) -> Result<DispatchAccepted, DispatchError> {
        tracing::debug!(
            "Dispatching {} ({}) to {}",
            request.document_id,
            request.owner_id,
            self.process_url
        );

        let response = self
            .http_client
            .post(&self.process_url)
            .json(&ProcessEnvelope { record: request })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DispatchError::Transient {
                reason: if e.is_timeout() {
                    format!("request timed out after {:?}", self.timeout)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| DispatchError::Transient {
            reason: format!("failed to read response body: {}", e),
        })?;

        if status.is_success() {
            let body = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
            return Ok(DispatchAccepted {
                status: status.as_u16(),
                body,
            });
        }

        if status.is_server_error() {
            return Err(DispatchError::ServiceUnavailable {
                status: status.as_u16(),
                body,
            });
        }

        Err(DispatchError::RequestRejected {
            status: status.as_u16(),
            body,
        })
    }
}

use anyhow::Result;
use reqwest::Client;
use serde_json::{json, Value};

use crate::{config::Config, error::SubmitError, protocol::ReviewPayload};

use super::ReportSink;

/// Client for the review collection endpoint.
pub struct ReviewEndpoint {
    client: Client,
    endpoint: String,
}

impl ReviewEndpoint {
    /// Client posting to `config.submit_url`.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.submit_url.clone(),
        })
    }
}

impl ReportSink for ReviewEndpoint {
    async fn send(&self, payload: &ReviewPayload) -> Result<ReviewResponse, SubmitError> {
        log::info!(
            "submitting review for {} at {}, {}",
            payload.user_id,
            payload.latitude,
            payload.longitude
        );

        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::MalformedBody(e.to_string()))?;

        Ok(ReviewResponse { status, body })
    }
}

/// Status and body of the endpoint's answer, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body as text, possibly empty.
    pub body: String,
}

/// An accepted review, with whatever the endpoint said about it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewReceipt {
    /// HTTP status code.
    pub status: u16,
    /// Parsed body; plain-text bodies end up under `status`.
    pub data: Value,
}

impl ReviewResponse {
    /// Interpret the answer: any non-2xx status is a failure, whatever the body says.
    pub fn into_receipt(self) -> Result<ReviewReceipt, SubmitError> {
        // bodies are JSON most of the time, but plain text is accepted too
        let data = if self.body.is_empty() {
            json!({})
        } else {
            serde_json::from_str(&self.body).unwrap_or_else(|e| {
                log::warn!("review response is not JSON ({e}), keeping raw text");
                json!({ "status": self.body })
            })
        };

        log::debug!("review response: status={} data={data}", self.status);

        if !(200..300).contains(&self.status) {
            let message = data
                .get("message")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty());

            return Err(match message {
                Some(message) => SubmitError::Status {
                    status: self.status,
                    message: message.to_string(),
                },
                None => SubmitError::from_status(self.status),
            });
        }

        Ok(ReviewReceipt {
            status: self.status,
            data,
        })
    }
}

//! Send gateway client
//!
//! Thin reqwest wrapper around the external send endpoint. A send is
//! successful only on an HTTP 2xx response whose body carries
//! `success: true`; everything else maps to a [`SendError`] the dispatcher
//! records on the message row.

use cadence_common::config::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a send attempt failed. The display string becomes the message's
/// `error_message`.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("timeout")]
    Timeout,

    #[error("send endpoint returned HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Endpoint(String),

    #[error("request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    name: &'a str,
    phone: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the downstream messaging gateway
#[derive(Clone)]
pub struct SendGateway {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl SendGateway {
    /// Create a gateway client from configuration
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Deliver one message to one recipient
    pub async fn send(&self, name: &str, phone: &str, message: &str) -> Result<(), SendError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&SendRequest {
                name,
                phone,
                message,
            })
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Status(status.as_u16()));
        }

        let body: SendResponse = response.json().await.map_err(classify_reqwest_error)?;
        if body.success {
            Ok(())
        } else {
            Err(SendError::Endpoint(body.error.unwrap_or_else(|| {
                "send endpoint reported failure".to_string()
            })))
        }
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> SendError {
    if e.is_timeout() {
        SendError::Timeout
    } else {
        SendError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_message_is_bare() {
        assert_eq!(SendError::Timeout.to_string(), "timeout");
    }

    #[test]
    fn decode_success_response() {
        let body: SendResponse = serde_json::from_str(r#"{"success": true, "id": "abc"}"#).unwrap();
        assert!(body.success);
        assert!(body.error.is_none());
    }

    #[test]
    fn decode_failure_response() {
        let body: SendResponse =
            serde_json::from_str(r#"{"success": false, "error": "invalid number"}"#).unwrap();
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("invalid number"));
    }

    #[test]
    fn empty_body_is_failure() {
        let body: SendResponse = serde_json::from_str("{}").unwrap();
        assert!(!body.success);
    }
}

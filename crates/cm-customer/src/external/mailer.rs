//! Email delivery

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use crate::shared::error::{CustomerError, Result};

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, destination: &str, subject: &str, content: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    destinations: [EmailAddress<'a>; 1],
    subject: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    target: &'a str,
}

/// Sender backed by the email service HTTP API.
pub struct HttpEmailSender {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEmailSender {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, destination: &str, subject: &str, content: &str) -> Result<()> {
        let url = format!("{}/v1/emails", self.base_url);
        let request = SendEmailRequest {
            destinations: [EmailAddress {
                kind: "email",
                target: destination,
            }],
            subject,
            content,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CustomerError::Upstream(format!(
                "email service returned {}: {}",
                status, body
            )));
        }

        debug!(subject = %subject, "Email handed to email service");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = SendEmailRequest {
            destinations: [EmailAddress {
                kind: "email",
                target: "jane@x.com",
            }],
            subject: "hello",
            content: "body",
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["destinations"][0]["type"], "email");
        assert_eq!(json["destinations"][0]["target"], "jane@x.com");
        assert_eq!(json["subject"], "hello");
    }
}

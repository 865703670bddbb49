//! Agent directory
//!
//! Agents log in with their email as username, so a signup email must not
//! collide with an existing agent in the agent service.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use crate::shared::error::{CustomerError, Result};

#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn username_exists(&self, username: &str) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct UsernameExistsResponse {
    exists: bool,
}

/// Directory backed by the agent service HTTP API.
pub struct HttpAgentDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAgentDirectory {
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

    fn endpoint(&self) -> String {
        format!("{}/v1/agents/username-exists", self.base_url)
    }
}

#[async_trait]
impl AgentDirectory for HttpAgentDirectory {
    async fn username_exists(&self, username: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("username", username)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CustomerError::Upstream(format!(
                "agent directory returned {}: {}",
                status, body
            )));
        }

        let body: UsernameExistsResponse = response.json().await?;
        debug!(exists = body.exists, "Agent directory lookup");
        Ok(body.exists)
    }
}

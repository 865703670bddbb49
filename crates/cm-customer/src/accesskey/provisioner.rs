//! Accesskey Provisioner
//!
//! Issues API credentials for an activated customer.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::accesskey::entity::{Accesskey, IssuedAccesskey, TOKEN_PREFIX_LEN};
use crate::accesskey::repository::AccesskeyRepository;
use crate::shared::error::Result;
use crate::shared::token::{random_hex, sha256_hex, ACCESSKEY_TOKEN_BYTES};

/// Name given to the key created on activation
pub const DEFAULT_ACCESSKEY_NAME: &str = "default";

/// Detail given to the key created on activation
pub const DEFAULT_ACCESSKEY_DETAIL: &str = "Auto-provisioned API key";

/// Expiry applied when the caller does not request one (10 years)
pub fn default_expiry() -> Duration {
    Duration::days(365 * 10)
}

#[async_trait]
pub trait AccesskeyProvisioner: Send + Sync {
    /// Create a credential. `expire` of `None` uses the default expiry.
    async fn create(
        &self,
        customer_id: Uuid,
        name: &str,
        detail: &str,
        expire: Option<Duration>,
    ) -> Result<IssuedAccesskey>;
}

/// Provisioner that stores keys through an [`AccesskeyRepository`].
pub struct RepositoryAccesskeyProvisioner {
    repo: Arc<dyn AccesskeyRepository>,
}

impl RepositoryAccesskeyProvisioner {
    pub fn new(repo: Arc<dyn AccesskeyRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl AccesskeyProvisioner for RepositoryAccesskeyProvisioner {
    async fn create(
        &self,
        customer_id: Uuid,
        name: &str,
        detail: &str,
        expire: Option<Duration>,
    ) -> Result<IssuedAccesskey> {
        let now = Utc::now();
        let token = random_hex(ACCESSKEY_TOKEN_BYTES);

        let accesskey = Accesskey {
            id: Uuid::new_v4(),
            customer_id,
            name: name.to_string(),
            detail: detail.to_string(),
            token_hash: sha256_hex(&token),
            token_prefix: token[..TOKEN_PREFIX_LEN].to_string(),
            tm_expire: now + expire.unwrap_or_else(default_expiry),
            tm_create: now,
            tm_update: None,
            tm_delete: None,
        };

        self.repo.create(&accesskey).await?;

        info!(
            accesskey_id = %accesskey.id,
            customer_id = %customer_id,
            "Accesskey created"
        );

        Ok(IssuedAccesskey { accesskey, token })
    }
}

//! Accesskey Entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the token prefix kept for display and lookup
pub const TOKEN_PREFIX_LEN: usize = 8;

/// Stored API credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accesskey {
    pub id: Uuid,
    pub customer_id: Uuid,

    pub name: String,
    pub detail: String,

    /// SHA-256 of the raw token, hex encoded
    #[serde(skip_serializing, default)]
    pub token_hash: String,

    /// First characters of the raw token
    pub token_prefix: String,

    pub tm_expire: DateTime<Utc>,
    pub tm_create: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tm_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tm_delete: Option<DateTime<Utc>>,
}

impl Accesskey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.tm_expire <= now
    }
}

/// A freshly created accesskey together with its raw token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedAccesskey {
    #[serde(flatten)]
    pub accesskey: Accesskey,

    /// Raw token; never persisted
    pub token: String,
}

impl IssuedAccesskey {
    pub fn id(&self) -> Uuid {
        self.accesskey.id
    }

    pub fn customer_id(&self) -> Uuid {
        self.accesskey.customer_id
    }
}

//! Session/Lock Service contract
//!
//! Ephemeral, TTL-bound state used by the signup and verification flows:
//! - signup sessions keyed by temp token
//! - single-use email verification tokens
//! - OTP attempt counters
//! - per-customer verification locks
//!
//! The Redis implementation lives in the `cm-session` crate.

mod memory;

pub use memory::InMemorySessionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::shared::error::Result;

/// Lifetime of a signup session
pub const SIGNUP_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Lifetime of an email verification token
pub const EMAIL_VERIFY_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Lifetime of an attempt counter, set when it is first created
pub const SIGNUP_ATTEMPT_TTL: Duration = Duration::from_secs(60 * 60);

/// Lifetime of a verification lock
pub const VERIFY_LOCK_TTL: Duration = Duration::from_secs(30);

/// OTP attempts allowed per temp token
pub const MAX_SIGNUP_ATTEMPTS: u64 = 5;

/// State behind a temp token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupSession {
    pub customer_id: Uuid,
    pub otp_code: String,
    pub verify_token: String,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn signup_session_set(
        &self,
        temp_token: &str,
        session: &SignupSession,
        ttl: Duration,
    ) -> Result<()>;

    async fn signup_session_get(&self, temp_token: &str) -> Result<Option<SignupSession>>;

    async fn signup_session_delete(&self, temp_token: &str) -> Result<()>;

    async fn email_verify_token_set(&self, token: &str, customer_id: Uuid, ttl: Duration)
        -> Result<()>;

    async fn email_verify_token_get(&self, token: &str) -> Result<Option<Uuid>>;

    async fn email_verify_token_delete(&self, token: &str) -> Result<()>;

    /// Increment and return the attempt count. The TTL applies from the
    /// first increment and is not extended by later ones.
    async fn signup_attempt_increment(&self, temp_token: &str, ttl: Duration) -> Result<u64>;

    async fn signup_attempt_delete(&self, temp_token: &str) -> Result<()>;

    /// Try to take the verification lock. Returns a holder token unique to
    /// this acquisition, or `None` if someone else holds the lock.
    async fn verify_lock_acquire(&self, customer_id: Uuid, ttl: Duration) -> Result<Option<String>>;

    /// Release the lock only if it is still held under `holder`.
    async fn verify_lock_release(&self, customer_id: Uuid, holder: &str) -> Result<()>;
}

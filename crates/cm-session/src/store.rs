//! Redis session store
//!
//! Counters and lock release are Lua scripts so each check-and-act is
//! atomic on the server.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cm_customer::{SessionStore, SignupSession};

use crate::error::{Result, SessionError};

/// INCR, setting the expiry only when the key is created.
const INCREMENT_SCRIPT: &str = r#"
    local n = redis.call("INCR", KEYS[1])
    if n == 1 then
        redis.call("EXPIRE", KEYS[1], ARGV[1])
    end
    return n
"#;

/// DEL only if the lock is still ours.
const RELEASE_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    else
        return 0
    end
"#;

/// Session store configuration
#[derive(Debug, Clone)]
pub struct RedisSessionConfig {
    pub redis_url: String,
    pub key_prefix: String,
}

impl RedisSessionConfig {
    pub fn new(redis_url: String) -> Self {
        Self {
            redis_url,
            key_prefix: "customer".to_string(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: String) -> Self {
        self.key_prefix = prefix;
        self
    }
}

/// Key naming for every value the store writes
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn signup_session(&self, temp_token: &str) -> String {
        format!("{}:signup_session:{}", self.prefix, temp_token)
    }

    pub fn email_verify(&self, token: &str) -> String {
        format!("{}:email_verify:{}", self.prefix, token)
    }

    pub fn signup_attempts(&self, temp_token: &str) -> String {
        format!("{}:signup_attempts:{}", self.prefix, temp_token)
    }

    pub fn verify_lock(&self, customer_id: Uuid) -> String {
        format!("{}:verify_lock:{}", self.prefix, customer_id)
    }
}

/// Redis expiry in whole seconds, never zero.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

pub struct RedisSessionStore {
    conn: ConnectionManager,
    keys: KeySpace,
}

impl RedisSessionStore {
    pub async fn new(config: RedisSessionConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| SessionError::Connection(e.to_string()))?;

        let conn = ConnectionManager::new(client).await?;

        info!(key_prefix = %config.key_prefix, "Redis session store connected");

        Ok(Self {
            conn,
            keys: KeySpace::new(config.key_prefix),
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = redis::Script::new(INCREMENT_SCRIPT)
            .key(key)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn try_lock(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        // SET key holder NX EX seconds
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(holder)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(result.is_some())
    }

    async fn unlock(&self, key: &str, holder: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let released: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(holder)
            .invoke_async(&mut conn)
            .await?;
        Ok(released == 1)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn signup_session_set(
        &self,
        temp_token: &str,
        session: &SignupSession,
        ttl: Duration,
    ) -> cm_customer::Result<()> {
        let value = serde_json::to_string(session).map_err(SessionError::from)?;
        self.set_ex(&self.keys.signup_session(temp_token), &value, ttl)
            .await?;
        Ok(())
    }

    async fn signup_session_get(&self, temp_token: &str) -> cm_customer::Result<Option<SignupSession>> {
        let Some(value) = self.get(&self.keys.signup_session(temp_token)).await? else {
            return Ok(None);
        };
        let session = serde_json::from_str(&value).map_err(SessionError::from)?;
        Ok(Some(session))
    }

    async fn signup_session_delete(&self, temp_token: &str) -> cm_customer::Result<()> {
        self.del(&self.keys.signup_session(temp_token)).await?;
        Ok(())
    }

    async fn email_verify_token_set(
        &self,
        token: &str,
        customer_id: Uuid,
        ttl: Duration,
    ) -> cm_customer::Result<()> {
        self.set_ex(&self.keys.email_verify(token), &customer_id.to_string(), ttl)
            .await?;
        Ok(())
    }

    async fn email_verify_token_get(&self, token: &str) -> cm_customer::Result<Option<Uuid>> {
        let key = self.keys.email_verify(token);
        let Some(value) = self.get(&key).await? else {
            return Ok(None);
        };
        let id = Uuid::parse_str(&value).map_err(|_| SessionError::Corrupt { key, value })?;
        Ok(Some(id))
    }

    async fn email_verify_token_delete(&self, token: &str) -> cm_customer::Result<()> {
        self.del(&self.keys.email_verify(token)).await?;
        Ok(())
    }

    async fn signup_attempt_increment(&self, temp_token: &str, ttl: Duration) -> cm_customer::Result<u64> {
        let count = self
            .increment(&self.keys.signup_attempts(temp_token), ttl)
            .await?;
        debug!(attempts = count, "Signup attempt counted");
        Ok(count)
    }

    async fn signup_attempt_delete(&self, temp_token: &str) -> cm_customer::Result<()> {
        self.del(&self.keys.signup_attempts(temp_token)).await?;
        Ok(())
    }

    async fn verify_lock_acquire(
        &self,
        customer_id: Uuid,
        ttl: Duration,
    ) -> cm_customer::Result<Option<String>> {
        let holder = Uuid::new_v4().to_string();
        let acquired = self
            .try_lock(&self.keys.verify_lock(customer_id), &holder, ttl)
            .await?;
        debug!(customer_id = %customer_id, acquired, "Verify lock acquire");
        Ok(acquired.then_some(holder))
    }

    async fn verify_lock_release(&self, customer_id: Uuid, holder: &str) -> cm_customer::Result<()> {
        if !self.unlock(&self.keys.verify_lock(customer_id), holder).await? {
            warn!(customer_id = %customer_id, "Verify lock already expired or taken over");
        }
        Ok(())
    }
}

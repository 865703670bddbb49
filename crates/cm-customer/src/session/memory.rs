//! In-memory session store with TTL expiry.
//!
//! Expiry is evaluated lazily on access against `tokio::time::Instant`, so
//! tests can drive it with a paused clock.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::{SessionStore, SignupSession};
use crate::shared::error::Result;

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

fn get_live<T: Clone>(map: &mut HashMap<String, Entry<T>>, key: &str) -> Option<T> {
    match map.get(key) {
        Some(entry) if entry.is_live() => Some(entry.value.clone()),
        Some(_) => {
            map.remove(key);
            None
        }
        None => None,
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Entry<SignupSession>>>,
    tokens: Mutex<HashMap<String, Entry<Uuid>>>,
    attempts: Mutex<HashMap<String, Entry<u64>>>,
    locks: Mutex<HashMap<String, Entry<String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live verification lock exists for the customer.
    pub fn is_locked(&self, customer_id: Uuid) -> bool {
        get_live(&mut self.locks.lock(), &customer_id.to_string()).is_some()
    }

    /// Current attempt count without incrementing.
    pub fn attempts(&self, temp_token: &str) -> u64 {
        get_live(&mut self.attempts.lock(), temp_token).unwrap_or(0)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn signup_session_set(
        &self,
        temp_token: &str,
        session: &SignupSession,
        ttl: Duration,
    ) -> Result<()> {
        self.sessions
            .lock()
            .insert(temp_token.to_string(), Entry::new(session.clone(), ttl));
        Ok(())
    }

    async fn signup_session_get(&self, temp_token: &str) -> Result<Option<SignupSession>> {
        Ok(get_live(&mut self.sessions.lock(), temp_token))
    }

    async fn signup_session_delete(&self, temp_token: &str) -> Result<()> {
        self.sessions.lock().remove(temp_token);
        Ok(())
    }

    async fn email_verify_token_set(
        &self,
        token: &str,
        customer_id: Uuid,
        ttl: Duration,
    ) -> Result<()> {
        self.tokens
            .lock()
            .insert(token.to_string(), Entry::new(customer_id, ttl));
        Ok(())
    }

    async fn email_verify_token_get(&self, token: &str) -> Result<Option<Uuid>> {
        Ok(get_live(&mut self.tokens.lock(), token))
    }

    async fn email_verify_token_delete(&self, token: &str) -> Result<()> {
        self.tokens.lock().remove(token);
        Ok(())
    }

    async fn signup_attempt_increment(&self, temp_token: &str, ttl: Duration) -> Result<u64> {
        let mut attempts = self.attempts.lock();
        match attempts.get_mut(temp_token) {
            Some(entry) if entry.is_live() => {
                entry.value += 1;
                Ok(entry.value)
            }
            _ => {
                attempts.insert(temp_token.to_string(), Entry::new(1, ttl));
                Ok(1)
            }
        }
    }

    async fn signup_attempt_delete(&self, temp_token: &str) -> Result<()> {
        self.attempts.lock().remove(temp_token);
        Ok(())
    }

    async fn verify_lock_acquire(&self, customer_id: Uuid, ttl: Duration) -> Result<Option<String>> {
        let mut locks = self.locks.lock();
        let key = customer_id.to_string();
        if locks.get(&key).is_some_and(|entry| entry.is_live()) {
            return Ok(None);
        }
        let holder = Uuid::new_v4().to_string();
        locks.insert(key, Entry::new(holder.clone(), ttl));
        Ok(Some(holder))
    }

    async fn verify_lock_release(&self, customer_id: Uuid, holder: &str) -> Result<()> {
        let mut locks = self.locks.lock();
        let key = customer_id.to_string();
        if locks.get(&key).is_some_and(|entry| entry.value == holder) {
            locks.remove(&key);
        }
        Ok(())
    }
}

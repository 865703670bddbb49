//! Customer Manager Session Store
//!
//! Redis implementation of [`cm_customer::SessionStore`].
//!
//! # Key layout
//!
//! | Key | Value | Expiry |
//! |-----|-------|--------|
//! | `{prefix}:signup_session:{temp_token}` | JSON [`SignupSession`](cm_customer::SignupSession) | caller TTL |
//! | `{prefix}:email_verify:{token}` | customer id | caller TTL |
//! | `{prefix}:signup_attempts:{temp_token}` | counter | set on first increment |
//! | `{prefix}:verify_lock:{customer_id}` | holder id | caller TTL |
//!
//! # Example
//!
//! ```no_run
//! use cm_session::{RedisSessionConfig, RedisSessionStore};
//!
//! async fn example() {
//!     let config = RedisSessionConfig::new("redis://localhost:6379".to_string());
//!     let store = RedisSessionStore::new(config).await.unwrap();
//! }
//! ```

mod error;
mod store;

pub use error::{Result, SessionError};
pub use store::{KeySpace, RedisSessionConfig, RedisSessionStore};

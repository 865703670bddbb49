//! Customer Manager Core
//!
//! Account lifecycle of a platform customer:
//! - Signup of an unverified customer with emailed link and OTP code
//! - Activation through either the email link or the headless OTP path,
//!   exactly once per customer
//! - Freeze / recover transitions guarded by conditional store writes
//! - Background reclamation of stale signups and expired frozen accounts
//!
//! ## Module Organization (Aggregate-based)
//!
//! Each aggregate contains:
//! - `entity` - Domain entities
//! - `repository` - Data access trait plus in-memory and Postgres stores
//! - `operations` - Use case operations (where applicable)
//!
//! Collaborators outside the relational store (`session`, `notify`,
//! `external`) are traits so the binary can wire production adapters and
//! tests can wire fakes.

// Aggregates
pub mod customer;
pub mod accesskey;

// Collaborators
pub mod session;
pub mod notify;
pub mod external;

// Background sweeps
pub mod janitor;

// Facade
pub mod service;

// Shared infrastructure
pub mod shared;

pub use shared::error::{CustomerError, Result};

pub use customer::entity::{
    Customer, CustomerField, CustomerFilter, CustomerStatus, CustomerUpdate, TransitionOutcome,
    WebhookMethod,
};
pub use customer::repository::CustomerRepository;
pub use customer::memory::InMemoryCustomerRepository;
#[cfg(feature = "postgres")]
pub use customer::postgres::PostgresCustomerRepository;

pub use accesskey::entity::{Accesskey, IssuedAccesskey};
pub use accesskey::provisioner::{AccesskeyProvisioner, RepositoryAccesskeyProvisioner};
pub use accesskey::repository::{AccesskeyRepository, InMemoryAccesskeyRepository};

pub use session::{InMemorySessionStore, SessionStore, SignupSession};
pub use notify::{CustomerEvent, EventNotifier, EventType};
pub use external::{AgentDirectory, EmailSender};
pub use janitor::{ExpiryJanitor, JanitorSettings};
pub use service::{CustomerService, LifecycleSettings};

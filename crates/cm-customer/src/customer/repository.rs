//! Customer Repository
//!
//! The relational system of record. State transitions are conditional
//! writes: implementations must apply `freeze`/`recover` only when the row
//! is still in the expected source state, atomically with the check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::customer::entity::{Customer, CustomerFilter, CustomerUpdate, TransitionOutcome};
use crate::shared::error::Result;

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Customer>>;

    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>>;

    async fn create(&self, customer: &Customer) -> Result<()>;

    /// Partial update of a live customer. Fails with `NotFound` if the row
    /// is missing or soft-deleted.
    async fn update(&self, id: Uuid, update: &CustomerUpdate) -> Result<()>;

    /// Active -> Frozen, scheduling anonymization at `scheduled_at`.
    async fn freeze(&self, id: Uuid, scheduled_at: DateTime<Utc>) -> Result<TransitionOutcome>;

    /// Frozen -> Active, clearing the deletion schedule.
    async fn recover(&self, id: Uuid) -> Result<TransitionOutcome>;

    /// Physically remove the row if it is still live, unverified and
    /// created before `cutoff`. Returns whether a row was removed.
    async fn delete_unverified(&self, id: Uuid, cutoff: DateTime<Utc>) -> Result<bool>;

    /// Scrub PII, mark the row deleted and stamp `tm_delete`, only if it is
    /// still live, frozen and scheduled at or before `cutoff`. Returns
    /// whether the row was anonymized.
    async fn anonymize_expired(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool>;

    /// Frozen customers whose deletion schedule is at or before `cutoff`.
    async fn list_frozen_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Customer>>;
}

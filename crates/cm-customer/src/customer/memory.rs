//! In-memory customer repository.
//!
//! Used in dev mode and tests. Conditional transitions are evaluated under
//! the map lock, giving the same race semantics as the SQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::customer::entity::{
    Customer, CustomerFilter, CustomerStatus, CustomerUpdate, TransitionOutcome,
};
use crate::customer::repository::CustomerRepository;
use crate::shared::error::{CustomerError, Result};
use crate::shared::validation::normalize_email;

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: Mutex<HashMap<Uuid, Customer>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row as-is. Test seeding helper.
    pub fn insert(&self, customer: Customer) {
        self.customers.lock().insert(customer.id, customer);
    }

    pub fn len(&self) -> usize {
        self.customers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.lock().is_empty()
    }

    fn transition<F>(&self, id: Uuid, from: CustomerStatus, apply: F) -> Result<TransitionOutcome>
    where
        F: FnOnce(&mut Customer),
    {
        let mut customers = self.customers.lock();
        let customer = customers
            .get_mut(&id)
            .ok_or_else(|| CustomerError::not_found("customer not found"))?;

        let applied = customer.status == from && customer.tm_delete.is_none();
        if applied {
            apply(customer);
        }

        Ok(TransitionOutcome {
            applied,
            current: customer.clone(),
        })
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Customer>> {
        Ok(self.customers.lock().get(&id).cloned())
    }

    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let mut customers: Vec<Customer> = self
            .customers
            .lock()
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        customers.sort_by_key(|c| c.tm_create);
        Ok(customers)
    }

    async fn create(&self, customer: &Customer) -> Result<()> {
        let mut customers = self.customers.lock();
        if customers.contains_key(&customer.id) {
            return Err(CustomerError::conflict("customer already exists"));
        }
        let email = normalize_email(&customer.email);
        if customers
            .values()
            .any(|c| c.tm_delete.is_none() && normalize_email(&c.email) == email)
        {
            return Err(CustomerError::conflict("email already in use"));
        }
        customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update(&self, id: Uuid, update: &CustomerUpdate) -> Result<()> {
        let mut customers = self.customers.lock();
        match customers.get_mut(&id) {
            Some(customer) if customer.tm_delete.is_none() => {
                update.apply_to(customer, Utc::now());
                Ok(())
            }
            _ => Err(CustomerError::not_found("customer not found")),
        }
    }

    async fn freeze(&self, id: Uuid, scheduled_at: DateTime<Utc>) -> Result<TransitionOutcome> {
        self.transition(id, CustomerStatus::Active, |customer| {
            customer.status = CustomerStatus::Frozen;
            customer.tm_deletion_scheduled = Some(scheduled_at);
            customer.tm_update = Some(Utc::now());
        })
    }

    async fn recover(&self, id: Uuid) -> Result<TransitionOutcome> {
        self.transition(id, CustomerStatus::Frozen, |customer| {
            customer.status = CustomerStatus::Active;
            customer.tm_deletion_scheduled = None;
            customer.tm_update = Some(Utc::now());
        })
    }

    async fn delete_unverified(&self, id: Uuid, cutoff: DateTime<Utc>) -> Result<bool> {
        let mut customers = self.customers.lock();
        let eligible = customers.get(&id).is_some_and(|c| {
            !c.email_verified && c.tm_delete.is_none() && c.tm_create < cutoff
        });
        if eligible {
            customers.remove(&id);
        }
        Ok(eligible)
    }

    async fn anonymize_expired(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool> {
        let mut customers = self.customers.lock();
        let customer = customers
            .get_mut(&id)
            .ok_or_else(|| CustomerError::not_found("customer not found"))?;

        let eligible = customer.status == CustomerStatus::Frozen
            && customer.tm_delete.is_none()
            && customer.tm_deletion_scheduled.is_some_and(|at| at <= cutoff);
        if eligible {
            customer.anonymize(name, email, Utc::now());
        }
        Ok(eligible)
    }

    async fn list_frozen_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Customer>> {
        let filter = CustomerFilter::new().status(CustomerStatus::Frozen);
        let mut customers: Vec<Customer> = self
            .customers
            .lock()
            .values()
            .filter(|c| filter.matches(c))
            .filter(|c| c.tm_deletion_scheduled.is_some_and(|at| at <= cutoff))
            .cloned()
            .collect();
        customers.sort_by_key(|c| c.tm_deletion_scheduled);
        Ok(customers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_freeze_applies_once() {
        let repo = InMemoryCustomerRepository::new();
        let customer = Customer::new("Jane", "jane@x.com");
        repo.create(&customer).await.unwrap();

        let at = Utc::now() + Duration::days(30);
        let first = repo.freeze(customer.id, at).await.unwrap();
        assert!(first.applied);
        assert_eq!(first.current.status, CustomerStatus::Frozen);
        assert_eq!(first.current.tm_deletion_scheduled, Some(at));

        let second = repo.freeze(customer.id, at).await.unwrap();
        assert!(!second.applied);
        assert_eq!(second.current.status, CustomerStatus::Frozen);
    }

    #[tokio::test]
    async fn test_recover_clears_schedule() {
        let repo = InMemoryCustomerRepository::new();
        let customer = Customer::new("Jane", "jane@x.com");
        repo.create(&customer).await.unwrap();
        repo.freeze(customer.id, Utc::now()).await.unwrap();

        let outcome = repo.recover(customer.id).await.unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.current.status, CustomerStatus::Active);
        assert!(outcome.current.tm_deletion_scheduled.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_live_duplicate_email() {
        let repo = InMemoryCustomerRepository::new();
        repo.create(&Customer::new("Jane", "jane@x.com")).await.unwrap();

        let err = repo
            .create(&Customer::new("Other", " Jane@X.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, CustomerError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_transition_on_missing_row() {
        let repo = InMemoryCustomerRepository::new();
        let result = repo.freeze(Uuid::new_v4(), Utc::now()).await;
        assert!(matches!(result, Err(CustomerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_rejects_deleted_rows() {
        let repo = InMemoryCustomerRepository::new();
        let customer = Customer::new("Jane", "jane@x.com");
        repo.create(&customer).await.unwrap();
        repo.freeze(customer.id, Utc::now()).await.unwrap();
        let anonymized = repo
            .anonymize_expired(customer.id, "deleted-user-x", "deleted-x@removed.invalid", Utc::now())
            .await
            .unwrap();
        assert!(anonymized);

        let result = repo
            .update(customer.id, &CustomerUpdate::new().name("Back"))
            .await;
        assert!(matches!(result, Err(CustomerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_frozen_expired_honours_cutoff() {
        let repo = InMemoryCustomerRepository::new();
        let due = Customer::new("Due", "due@x.com");
        let later = Customer::new("Later", "later@x.com");
        repo.create(&due).await.unwrap();
        repo.create(&later).await.unwrap();

        let now = Utc::now();
        repo.freeze(due.id, now - Duration::seconds(1)).await.unwrap();
        repo.freeze(later.id, now + Duration::days(3)).await.unwrap();

        let expired = repo.list_frozen_expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, due.id);
    }

    #[tokio::test]
    async fn test_anonymize_skips_recovered_customer() {
        let repo = InMemoryCustomerRepository::new();
        let customer = Customer::new("Jane", "jane@x.com");
        repo.create(&customer).await.unwrap();
        repo.freeze(customer.id, Utc::now() - Duration::seconds(1)).await.unwrap();
        repo.recover(customer.id).await.unwrap();

        let anonymized = repo
            .anonymize_expired(customer.id, "deleted-user-x", "deleted-x@removed.invalid", Utc::now())
            .await
            .unwrap();

        assert!(!anonymized);
        let current = repo.get(customer.id).await.unwrap().unwrap();
        assert_eq!(current.status, CustomerStatus::Active);
        assert_eq!(current.email, "jane@x.com");
    }

    #[tokio::test]
    async fn test_anonymize_skips_schedule_in_future() {
        let repo = InMemoryCustomerRepository::new();
        let customer = Customer::new("Jane", "jane@x.com");
        repo.create(&customer).await.unwrap();
        repo.freeze(customer.id, Utc::now() + Duration::days(1)).await.unwrap();

        let anonymized = repo
            .anonymize_expired(customer.id, "n", "e@removed.invalid", Utc::now())
            .await
            .unwrap();
        assert!(!anonymized);
    }

    #[tokio::test]
    async fn test_delete_unverified_keeps_verified_customer() {
        let repo = InMemoryCustomerRepository::new();
        let mut customer = Customer::new("Jane", "jane@x.com");
        customer.tm_create = Utc::now() - Duration::hours(2);
        repo.create(&customer).await.unwrap();
        repo.update(customer.id, &CustomerUpdate::new().email_verified(true))
            .await
            .unwrap();

        let deleted = repo.delete_unverified(customer.id, Utc::now()).await.unwrap();

        assert!(!deleted);
        assert!(repo.get(customer.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_unverified_removes_stale_row() {
        let repo = InMemoryCustomerRepository::new();
        let mut customer = Customer::new("Jane", "jane@x.com");
        customer.tm_create = Utc::now() - Duration::hours(2);
        repo.create(&customer).await.unwrap();

        assert!(repo.delete_unverified(customer.id, Utc::now()).await.unwrap());
        assert!(repo.get(customer.id).await.unwrap().is_none());
        assert!(!repo.delete_unverified(customer.id, Utc::now()).await.unwrap());
    }
}

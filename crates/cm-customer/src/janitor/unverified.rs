//! Unverified signup reaper

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::customer::entity::CustomerFilter;
use crate::customer::repository::CustomerRepository;
use crate::shared::error::Result;

#[derive(Clone)]
pub struct UnverifiedReaper {
    customers: Arc<dyn CustomerRepository>,
    max_age: chrono::Duration,
}

impl UnverifiedReaper {
    pub fn new(customers: Arc<dyn CustomerRepository>, max_age: chrono::Duration) -> Self {
        Self { customers, max_age }
    }

    /// Hard-delete live, unverified customers created before now - max_age.
    /// Rows verified after the listing are left alone. Returns the number
    /// deleted. No events are published.
    pub async fn run_once(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.max_age;
        let stale = self
            .customers
            .list(
                &CustomerFilter::new()
                    .email_verified(false)
                    .created_before(cutoff),
            )
            .await?;

        let mut deleted = 0;
        for customer in &stale {
            match self.customers.delete_unverified(customer.id, cutoff).await {
                Ok(true) => deleted += 1,
                Ok(false) => {
                    debug!(customer_id = %customer.id, "Customer no longer eligible for reaping");
                }
                Err(e) => {
                    error!(customer_id = %customer.id, error = %e, "Could not delete unverified customer");
                }
            }
        }

        if deleted > 0 {
            info!(count = deleted, "Reaped unverified customers");
        } else {
            debug!("No unverified customers to reap");
        }

        Ok(deleted)
    }
}

//! Frozen account expiry

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::customer::repository::CustomerRepository;
use crate::notify::{CustomerEvent, EventNotifier};
use crate::shared::error::Result;

#[derive(Clone)]
pub struct FrozenExpirySweep {
    customers: Arc<dyn CustomerRepository>,
    notifier: Arc<dyn EventNotifier>,
}

impl FrozenExpirySweep {
    pub fn new(customers: Arc<dyn CustomerRepository>, notifier: Arc<dyn EventNotifier>) -> Self {
        Self { customers, notifier }
    }

    /// Anonymize every frozen customer whose deletion schedule has passed
    /// and publish `customer_deleted` for each. Customers recovered after
    /// the listing are skipped. Returns the number anonymized.
    pub async fn run_once(&self) -> Result<usize> {
        let cutoff = Utc::now();
        let expired = self.customers.list_frozen_expired(cutoff).await?;

        let mut anonymized = 0;
        for customer in &expired {
            let (name, email) = customer.anonymized_identity();
            match self
                .customers
                .anonymize_expired(customer.id, &name, &email, cutoff)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    debug!(customer_id = %customer.id, "Customer no longer due for anonymization");
                    continue;
                }
                Err(e) => {
                    error!(customer_id = %customer.id, error = %e, "Could not anonymize frozen customer");
                    continue;
                }
            }
            anonymized += 1;

            match self.customers.get(customer.id).await {
                Ok(Some(deleted)) => self.notifier.publish(CustomerEvent::deleted(deleted)),
                Ok(None) => {
                    warn!(customer_id = %customer.id, "Anonymized customer vanished, skipping event");
                }
                Err(e) => {
                    warn!(customer_id = %customer.id, error = %e, "Could not re-fetch anonymized customer, skipping event");
                }
            }
        }

        if anonymized > 0 {
            info!(count = anonymized, "Anonymized expired frozen customers");
        } else {
            debug!("No expired frozen customers");
        }

        Ok(anonymized)
    }
}

//! Freeze Customer Use Case

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::customer::entity::{Customer, CustomerStatus};
use crate::customer::repository::CustomerRepository;
use crate::notify::{CustomerEvent, EventNotifier};
use crate::shared::error::{CustomerError, Result};

/// Command for freezing a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreezeCustomerCommand {
    pub customer_id: Uuid,
}

/// Use case for freezing an active customer.
///
/// A frozen customer is anonymized by the janitor once its retention
/// period runs out, unless it is recovered first.
pub struct FreezeCustomerUseCase {
    customers: Arc<dyn CustomerRepository>,
    notifier: Arc<dyn EventNotifier>,
    retention: Duration,
}

impl FreezeCustomerUseCase {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        notifier: Arc<dyn EventNotifier>,
        retention: Duration,
    ) -> Self {
        Self {
            customers,
            notifier,
            retention,
        }
    }

    pub async fn execute(&self, command: FreezeCustomerCommand) -> Result<Customer> {
        let id = command.customer_id;
        let customer = self
            .customers
            .get(id)
            .await?
            .ok_or_else(|| CustomerError::not_found("customer not found"))?;

        // Business rule: deleted customers are terminal
        if customer.is_deleted() {
            return Err(CustomerError::invalid_state("customer is deleted"));
        }

        if customer.status == CustomerStatus::Frozen {
            return Ok(customer);
        }

        let outcome = self
            .customers
            .freeze(id, Utc::now() + self.retention)
            .await?;

        if outcome.applied {
            info!(
                customer_id = %id,
                deletion_scheduled = ?outcome.current.tm_deletion_scheduled,
                "Customer frozen"
            );
            self.notifier
                .publish(CustomerEvent::frozen(outcome.current.clone()));
            return Ok(outcome.current);
        }

        // A concurrent freeze got there first.
        if outcome.current.status == CustomerStatus::Frozen {
            return Ok(outcome.current);
        }

        warn!(
            customer_id = %id,
            status = outcome.current.status.as_str(),
            "Freeze lost a race to a conflicting transition"
        );
        Err(CustomerError::conflict("customer state changed concurrently"))
    }
}

//! Recover Customer Use Case

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::customer::entity::{Customer, CustomerStatus};
use crate::customer::repository::CustomerRepository;
use crate::notify::{CustomerEvent, EventNotifier};
use crate::shared::error::{CustomerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverCustomerCommand {
    pub customer_id: Uuid,
}

/// Use case for returning a frozen customer to active.
pub struct RecoverCustomerUseCase {
    customers: Arc<dyn CustomerRepository>,
    notifier: Arc<dyn EventNotifier>,
}

impl RecoverCustomerUseCase {
    pub fn new(customers: Arc<dyn CustomerRepository>, notifier: Arc<dyn EventNotifier>) -> Self {
        Self { customers, notifier }
    }

    pub async fn execute(&self, command: RecoverCustomerCommand) -> Result<Customer> {
        let id = command.customer_id;
        let customer = self
            .customers
            .get(id)
            .await?
            .ok_or_else(|| CustomerError::not_found("customer not found"))?;

        if customer.is_deleted() {
            return Err(CustomerError::invalid_state("customer is deleted"));
        }

        if customer.status == CustomerStatus::Active {
            return Ok(customer);
        }

        let outcome = self.customers.recover(id).await?;

        if outcome.applied {
            info!(customer_id = %id, "Customer recovered");
            self.notifier
                .publish(CustomerEvent::recovered(outcome.current.clone()));
            return Ok(outcome.current);
        }

        if outcome.current.status == CustomerStatus::Active {
            return Ok(outcome.current);
        }

        warn!(
            customer_id = %id,
            status = outcome.current.status.as_str(),
            "Recover lost a race to a conflicting transition"
        );
        Err(CustomerError::conflict("customer state changed concurrently"))
    }
}

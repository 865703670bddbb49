//! Email Verify Use Case
//!
//! Activation through the emailed link.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::accesskey::provisioner::{
    AccesskeyProvisioner, DEFAULT_ACCESSKEY_DETAIL, DEFAULT_ACCESSKEY_NAME,
};
use crate::accesskey::IssuedAccesskey;
use crate::customer::entity::{Customer, CustomerUpdate};
use crate::customer::repository::CustomerRepository;
use crate::notify::{CustomerEvent, EventNotifier};
use crate::session::{SessionStore, VERIFY_LOCK_TTL};
use crate::shared::error::{CustomerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVerifyCommand {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVerifyResult {
    pub customer: Customer,

    /// Present only when this call performed the activation and
    /// provisioning succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accesskey: Option<IssuedAccesskey>,
}

pub struct EmailVerifyUseCase {
    customers: Arc<dyn CustomerRepository>,
    sessions: Arc<dyn SessionStore>,
    provisioner: Arc<dyn AccesskeyProvisioner>,
    notifier: Arc<dyn EventNotifier>,
}

impl EmailVerifyUseCase {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        sessions: Arc<dyn SessionStore>,
        provisioner: Arc<dyn AccesskeyProvisioner>,
        notifier: Arc<dyn EventNotifier>,
    ) -> Self {
        Self {
            customers,
            sessions,
            provisioner,
            notifier,
        }
    }

    pub async fn execute(&self, command: EmailVerifyCommand) -> Result<EmailVerifyResult> {
        let customer_id = match self.sessions.email_verify_token_get(&command.token).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(CustomerError::not_found("verification token expired or invalid"));
            }
            Err(e) => {
                warn!(error = %e, "Could not resolve verification token");
                return Err(CustomerError::not_found("verification token expired or invalid"));
            }
        };

        let Some(holder) = self
            .sessions
            .verify_lock_acquire(customer_id, VERIFY_LOCK_TTL)
            .await?
        else {
            return Err(CustomerError::conflict("verification already in progress"));
        };

        let result = self.activate(customer_id, &command.token).await;

        if let Err(e) = self.sessions.verify_lock_release(customer_id, &holder).await {
            warn!(customer_id = %customer_id, error = %e, "Could not release verify lock");
        }

        result
    }

    /// Runs with the verify lock held.
    async fn activate(&self, customer_id: Uuid, token: &str) -> Result<EmailVerifyResult> {
        let customer = self
            .customers
            .get(customer_id)
            .await?
            .ok_or_else(|| CustomerError::not_found("customer not found"))?;

        if customer.email_verified {
            info!(customer_id = %customer_id, "Customer already verified");
            return Ok(EmailVerifyResult {
                customer,
                accesskey: None,
            });
        }

        if let Err(e) = self
            .customers
            .update(customer_id, &CustomerUpdate::new().email_verified(true))
            .await
        {
            error!(customer_id = %customer_id, error = %e, "Could not verify customer");
            return Err(CustomerError::internal("could not verify customer"));
        }

        if let Err(e) = self.sessions.email_verify_token_delete(token).await {
            warn!(customer_id = %customer_id, error = %e, "Could not delete verification token");
        }

        let verified = match self.customers.get(customer_id).await {
            Ok(Some(c)) => c,
            Ok(None) => return Err(CustomerError::internal("could not get verified customer")),
            Err(e) => {
                error!(customer_id = %customer_id, error = %e, "Could not get verified customer");
                return Err(CustomerError::internal("could not get verified customer"));
            }
        };

        let accesskey = match self
            .provisioner
            .create(customer_id, DEFAULT_ACCESSKEY_NAME, DEFAULT_ACCESSKEY_DETAIL, None)
            .await
        {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(customer_id = %customer_id, error = %e, "Could not create default accesskey");
                None
            }
        };

        self.notifier
            .publish(CustomerEvent::created(verified.clone(), false));

        info!(customer_id = %customer_id, "Customer email verified");

        Ok(EmailVerifyResult {
            customer: verified,
            accesskey,
        })
    }
}

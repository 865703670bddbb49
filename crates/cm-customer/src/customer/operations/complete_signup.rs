//! Complete Signup Use Case
//!
//! Headless activation: the caller proves email ownership with the OTP
//! code from the verification email and its signup temp token.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::accesskey::provisioner::{
    AccesskeyProvisioner, DEFAULT_ACCESSKEY_DETAIL, DEFAULT_ACCESSKEY_NAME,
};
use crate::accesskey::IssuedAccesskey;
use crate::customer::entity::CustomerUpdate;
use crate::customer::repository::CustomerRepository;
use crate::notify::{CustomerEvent, EventNotifier};
use crate::session::{
    SessionStore, SignupSession, MAX_SIGNUP_ATTEMPTS, SIGNUP_ATTEMPT_TTL, VERIFY_LOCK_TTL,
};
use crate::shared::error::{CustomerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSignupCommand {
    pub temp_token: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSignupResult {
    pub customer_id: Uuid,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub accesskey: Option<IssuedAccesskey>,
}

pub struct CompleteSignupUseCase {
    customers: Arc<dyn CustomerRepository>,
    sessions: Arc<dyn SessionStore>,
    provisioner: Arc<dyn AccesskeyProvisioner>,
    notifier: Arc<dyn EventNotifier>,
}

impl CompleteSignupUseCase {
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

    pub async fn execute(&self, command: CompleteSignupCommand) -> Result<CompleteSignupResult> {
        let attempts = self
            .sessions
            .signup_attempt_increment(&command.temp_token, SIGNUP_ATTEMPT_TTL)
            .await
            .map_err(|e| {
                error!(error = %e, "Could not increment signup attempts");
                CustomerError::internal("internal error")
            })?;
        if attempts > MAX_SIGNUP_ATTEMPTS {
            warn!(attempts, "Signup attempt limit exceeded");
            return Err(CustomerError::rate_limited("too many attempts"));
        }

        let session = match self.sessions.signup_session_get(&command.temp_token).await {
            Ok(Some(s)) => s,
            Ok(None) => return Err(CustomerError::not_found("invalid or expired temp_token")),
            Err(e) => {
                warn!(error = %e, "Could not load signup session");
                return Err(CustomerError::not_found("invalid or expired temp_token"));
            }
        };

        // Session and counter are left for a retry.
        if session.otp_code != command.code {
            return Err(CustomerError::validation("invalid verification code"));
        }

        let customer_id = session.customer_id;
        let Some(holder) = self
            .sessions
            .verify_lock_acquire(customer_id, VERIFY_LOCK_TTL)
            .await?
        else {
            return Err(CustomerError::conflict("verification already in progress"));
        };

        let result = self.complete(&command.temp_token, &session).await;

        if let Err(e) = self.sessions.verify_lock_release(customer_id, &holder).await {
            warn!(customer_id = %customer_id, error = %e, "Could not release verify lock");
        }

        result
    }

    /// Runs with the verify lock held.
    async fn complete(
        &self,
        temp_token: &str,
        session: &SignupSession,
    ) -> Result<CompleteSignupResult> {
        let customer_id = session.customer_id;
        let customer = self
            .customers
            .get(customer_id)
            .await?
            .ok_or_else(|| CustomerError::not_found("customer not found"))?;

        if customer.email_verified {
            info!(customer_id = %customer_id, "Customer already verified");
            self.cleanup(temp_token, session).await;
            return Ok(CompleteSignupResult {
                customer_id,
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

        // Fatal on this path. The customer is already verified, so a retry
        // takes the already-verified branch and issues no key.
        let accesskey = match self
            .provisioner
            .create(customer_id, DEFAULT_ACCESSKEY_NAME, DEFAULT_ACCESSKEY_DETAIL, None)
            .await
        {
            Ok(key) => key,
            Err(e) => {
                error!(customer_id = %customer_id, error = %e, "Could not create default accesskey");
                return Err(CustomerError::internal("could not create access key"));
            }
        };

        self.cleanup(temp_token, session).await;

        match self.customers.get(customer_id).await {
            Ok(Some(verified)) => {
                self.notifier.publish(CustomerEvent::created(verified, true));
            }
            Ok(None) => {
                warn!(customer_id = %customer_id, "Verified customer vanished, skipping event");
            }
            Err(e) => {
                warn!(customer_id = %customer_id, error = %e, "Could not get verified customer, skipping event");
            }
        }

        info!(customer_id = %customer_id, "Customer signup completed");

        Ok(CompleteSignupResult {
            customer_id,
            accesskey: Some(accesskey),
        })
    }

    /// Best-effort removal of the session, counter and email token.
    async fn cleanup(&self, temp_token: &str, session: &SignupSession) {
        if let Err(e) = self.sessions.signup_session_delete(temp_token).await {
            warn!(error = %e, "Could not delete signup session");
        }
        if let Err(e) = self.sessions.signup_attempt_delete(temp_token).await {
            warn!(error = %e, "Could not delete signup attempt counter");
        }
        if let Err(e) = self
            .sessions
            .email_verify_token_delete(&session.verify_token)
            .await
        {
            warn!(error = %e, "Could not delete verification token");
        }
    }
}

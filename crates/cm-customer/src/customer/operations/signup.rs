//! Signup Use Case

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::customer::entity::{Customer, CustomerFilter, WebhookMethod};
use crate::customer::repository::CustomerRepository;
use crate::external::{AgentDirectory, EmailSender};
use crate::session::{SessionStore, SignupSession, EMAIL_VERIFY_TOKEN_TTL, SIGNUP_SESSION_TTL};
use crate::shared::error::{CustomerError, Result};
use crate::shared::token::{generate_otp, generate_temp_token, generate_verify_token};
use crate::shared::validation::{is_valid_email, normalize_email};

/// Returned for every email validation failure.
const EMAIL_NOT_AVAILABLE: &str = "the email is not available";

/// Command for signing up a new customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupCommand {
    pub name: String,

    #[serde(default)]
    pub detail: String,

    pub email: String,

    #[serde(default)]
    pub phone_number: String,

    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub webhook_method: WebhookMethod,

    #[serde(default)]
    pub webhook_uri: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResult {
    pub customer: Customer,
    pub temp_token: String,
}

/// Subject and body of the verification email.
pub fn verification_email(base_url: &str, token: &str, otp: &str) -> (String, String) {
    let link = format!(
        "{}/auth/email-verify?token={}",
        base_url.trim_end_matches('/'),
        token
    );
    let subject = format!("Verify Your Email (Code: {})", otp);
    let content = format!(
        "Welcome!\n\n\
         Please verify your email address by clicking the link below:\n\n\
         {}\n\n\
         Or enter this verification code: {}\n\n\
         The link and code expire in 1 hour.\n\n\
         If you did not create this account, you can ignore this email.",
        link, otp
    );
    (subject, content)
}

/// Creates an unverified customer and issues its verification artifacts.
pub struct SignupUseCase {
    customers: Arc<dyn CustomerRepository>,
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn AgentDirectory>,
    mailer: Arc<dyn EmailSender>,
    email_verify_base_url: String,
}

impl SignupUseCase {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        sessions: Arc<dyn SessionStore>,
        directory: Arc<dyn AgentDirectory>,
        mailer: Arc<dyn EmailSender>,
        email_verify_base_url: impl Into<String>,
    ) -> Self {
        Self {
            customers,
            sessions,
            directory,
            mailer,
            email_verify_base_url: email_verify_base_url.into(),
        }
    }

    pub async fn execute(&self, command: SignupCommand) -> Result<SignupResult> {
        let email = command.email.trim().to_string();
        self.validate_email(&email).await?;

        let customer = Customer::new(command.name, email)
            .with_detail(command.detail)
            .with_phone_number(command.phone_number)
            .with_address(command.address)
            .with_webhook(command.webhook_method, command.webhook_uri);

        match self.customers.create(&customer).await {
            Ok(()) => {}
            // Lost a race against a concurrent signup with the same email.
            Err(CustomerError::Conflict { .. }) => {
                return Err(CustomerError::validation(EMAIL_NOT_AVAILABLE));
            }
            Err(e) => {
                error!(error = %e, "Could not create customer");
                return Err(CustomerError::internal("could not create customer"));
            }
        }

        let customer = match self.customers.get(customer.id).await {
            Ok(Some(c)) => c,
            Ok(None) => return Err(CustomerError::internal("could not get created customer")),
            Err(e) => {
                error!(customer_id = %customer.id, error = %e, "Could not get created customer");
                return Err(CustomerError::internal("could not get created customer"));
            }
        };

        let verify_token = generate_verify_token();
        let otp_code = generate_otp();
        let temp_token = generate_temp_token();

        self.sessions
            .email_verify_token_set(&verify_token, customer.id, EMAIL_VERIFY_TOKEN_TTL)
            .await?;

        let session = SignupSession {
            customer_id: customer.id,
            otp_code: otp_code.clone(),
            verify_token: verify_token.clone(),
        };
        self.sessions
            .signup_session_set(&temp_token, &session, SIGNUP_SESSION_TTL)
            .await?;

        // Delivery failure does not fail the signup.
        let (subject, content) =
            verification_email(&self.email_verify_base_url, &verify_token, &otp_code);
        if let Err(e) = self.mailer.send(&customer.email, &subject, &content).await {
            warn!(customer_id = %customer.id, error = %e, "Could not send verification email");
        }

        info!(customer_id = %customer.id, "Customer signed up");

        Ok(SignupResult {
            customer,
            temp_token,
        })
    }

    async fn validate_email(&self, email: &str) -> Result<()> {
        if !is_valid_email(email) {
            return Err(CustomerError::validation(EMAIL_NOT_AVAILABLE));
        }

        let existing = self
            .customers
            .list(&CustomerFilter::new().email(email))
            .await
            .map_err(|e| {
                warn!(error = %e, "Could not check customer email");
                CustomerError::validation(EMAIL_NOT_AVAILABLE)
            })?;
        if !existing.is_empty() {
            return Err(CustomerError::validation(EMAIL_NOT_AVAILABLE));
        }

        let taken = self
            .directory
            .username_exists(&normalize_email(email))
            .await
            .map_err(|e| {
                warn!(error = %e, "Could not check agent usernames");
                CustomerError::validation(EMAIL_NOT_AVAILABLE)
            })?;
        if taken {
            return Err(CustomerError::validation(EMAIL_NOT_AVAILABLE));
        }

        Ok(())
    }
}

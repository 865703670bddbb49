//! Customer Service
//!
//! Facade bundling the lifecycle use cases behind one handle for the
//! transport layer.

use std::sync::Arc;

use crate::accesskey::AccesskeyProvisioner;
use crate::customer::entity::Customer;
use crate::customer::operations::{
    CompleteSignupCommand, CompleteSignupResult, CompleteSignupUseCase, EmailVerifyCommand,
    EmailVerifyResult, EmailVerifyUseCase, FreezeCustomerCommand, FreezeCustomerUseCase,
    RecoverCustomerCommand, RecoverCustomerUseCase, SignupCommand, SignupResult, SignupUseCase,
};
use crate::customer::repository::CustomerRepository;
use crate::external::{AgentDirectory, EmailSender};
use crate::notify::EventNotifier;
use crate::session::SessionStore;
use crate::shared::error::Result;

/// Tunables of the lifecycle operations
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// Base URL for the link in verification emails
    pub email_verify_base_url: String,
    /// Time between freeze and anonymization
    pub frozen_retention: chrono::Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            email_verify_base_url: "http://localhost:3000".to_string(),
            frozen_retention: chrono::Duration::days(30),
        }
    }
}

pub struct CustomerService {
    signup: SignupUseCase,
    email_verify: EmailVerifyUseCase,
    complete_signup: CompleteSignupUseCase,
    freeze: FreezeCustomerUseCase,
    recover: RecoverCustomerUseCase,
    customers: Arc<dyn CustomerRepository>,
}

impl CustomerService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        sessions: Arc<dyn SessionStore>,
        provisioner: Arc<dyn AccesskeyProvisioner>,
        notifier: Arc<dyn EventNotifier>,
        directory: Arc<dyn AgentDirectory>,
        mailer: Arc<dyn EmailSender>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            signup: SignupUseCase::new(
                customers.clone(),
                sessions.clone(),
                directory,
                mailer,
                settings.email_verify_base_url,
            ),
            email_verify: EmailVerifyUseCase::new(
                customers.clone(),
                sessions.clone(),
                provisioner.clone(),
                notifier.clone(),
            ),
            complete_signup: CompleteSignupUseCase::new(
                customers.clone(),
                sessions,
                provisioner,
                notifier.clone(),
            ),
            freeze: FreezeCustomerUseCase::new(
                customers.clone(),
                notifier.clone(),
                settings.frozen_retention,
            ),
            recover: RecoverCustomerUseCase::new(customers.clone(), notifier),
            customers,
        }
    }

    pub async fn signup(&self, command: SignupCommand) -> Result<SignupResult> {
        self.signup.execute(command).await
    }

    pub async fn email_verify(&self, command: EmailVerifyCommand) -> Result<EmailVerifyResult> {
        self.email_verify.execute(command).await
    }

    pub async fn complete_signup(
        &self,
        command: CompleteSignupCommand,
    ) -> Result<CompleteSignupResult> {
        self.complete_signup.execute(command).await
    }

    pub async fn freeze(&self, command: FreezeCustomerCommand) -> Result<Customer> {
        self.freeze.execute(command).await
    }

    pub async fn recover(&self, command: RecoverCustomerCommand) -> Result<Customer> {
        self.recover.execute(command).await
    }

    /// Repository handle for components sharing the store, such as the
    /// janitor.
    pub fn customers(&self) -> Arc<dyn CustomerRepository> {
        self.customers.clone()
    }
}

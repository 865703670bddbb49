//! Shared fakes for the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use cm_customer::{
    AccesskeyProvisioner, AgentDirectory, Customer, CustomerError, CustomerEvent, CustomerFilter,
    CustomerRepository, CustomerService, CustomerUpdate, EmailSender, EventNotifier, EventType,
    InMemoryAccesskeyRepository, InMemoryCustomerRepository, InMemorySessionStore,
    IssuedAccesskey, LifecycleSettings, RepositoryAccesskeyProvisioner, Result, SessionStore,
    SignupSession, TransitionOutcome,
};

// ============================================================================
// Notifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<CustomerEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<CustomerEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl EventNotifier for RecordingNotifier {
    fn publish(&self, event: CustomerEvent) {
        self.events.lock().push(event);
    }
}

// ============================================================================
// Directory and mailer
// ============================================================================

#[derive(Default)]
pub struct FakeDirectory {
    taken: Mutex<HashSet<String>>,
    pub fail: AtomicBool,
}

impl FakeDirectory {
    pub fn take(&self, username: &str) {
        self.taken.lock().insert(username.to_string());
    }
}

#[async_trait]
impl AgentDirectory for FakeDirectory {
    async fn username_exists(&self, username: &str) -> Result<bool> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CustomerError::Upstream("directory unavailable".into()));
        }
        Ok(self.taken.lock().contains(username))
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub destination: String,
    pub subject: String,
    pub content: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, destination: &str, subject: &str, content: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CustomerError::Upstream("smtp down".into()));
        }
        self.sent.lock().push(SentEmail {
            destination: destination.to_string(),
            subject: subject.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// Provisioner
// ============================================================================

pub struct TestProvisioner {
    inner: RepositoryAccesskeyProvisioner,
    pub fail: AtomicBool,
    calls: AtomicUsize,
}

impl TestProvisioner {
    pub fn new(repo: Arc<InMemoryAccesskeyRepository>) -> Self {
        Self {
            inner: RepositoryAccesskeyProvisioner::new(repo),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccesskeyProvisioner for TestProvisioner {
    async fn create(
        &self,
        customer_id: Uuid,
        name: &str,
        detail: &str,
        expire: Option<chrono::Duration>,
    ) -> Result<IssuedAccesskey> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CustomerError::Database("accesskey store down".into()));
        }
        self.inner.create(customer_id, name, detail, expire).await
    }
}

// ============================================================================
// Customer repository with failure injection
// ============================================================================

#[derive(Default)]
pub struct FlakyCustomerRepository {
    pub inner: InMemoryCustomerRepository,
    pub fail_update: AtomicBool,
    /// Reads fail once an update has been applied
    pub fail_reads_after_update: AtomicBool,
    /// Every listed customer gets verified before the caller sees the list
    pub verify_after_listing: AtomicBool,
    /// Every expired frozen customer gets recovered before the caller sees the list
    pub recover_after_listing: AtomicBool,
    updated: AtomicBool,
    fail_anonymize: Mutex<HashSet<Uuid>>,
    freeze_calls: AtomicUsize,
}

impl FlakyCustomerRepository {
    pub fn fail_anonymize_for(&self, id: Uuid) {
        self.fail_anonymize.lock().insert(id);
    }

    pub fn freeze_calls(&self) -> usize {
        self.freeze_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomerRepository for FlakyCustomerRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Customer>> {
        if self.fail_reads_after_update.load(Ordering::SeqCst) && self.updated.load(Ordering::SeqCst)
        {
            return Err(CustomerError::Database("read replica lagging".into()));
        }
        self.inner.get(id).await
    }

    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let listed = self.inner.list(filter).await?;
        if self.verify_after_listing.load(Ordering::SeqCst) {
            let verified = CustomerUpdate::new().email_verified(true);
            for customer in &listed {
                self.inner.update(customer.id, &verified).await?;
            }
        }
        Ok(listed)
    }

    async fn create(&self, customer: &Customer) -> Result<()> {
        self.inner.create(customer).await
    }

    async fn update(&self, id: Uuid, update: &CustomerUpdate) -> Result<()> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(CustomerError::Database("write failed".into()));
        }
        self.inner.update(id, update).await?;
        self.updated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn freeze(&self, id: Uuid, scheduled_at: DateTime<Utc>) -> Result<TransitionOutcome> {
        self.freeze_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.freeze(id, scheduled_at).await
    }

    async fn recover(&self, id: Uuid) -> Result<TransitionOutcome> {
        self.inner.recover(id).await
    }

    async fn delete_unverified(&self, id: Uuid, cutoff: DateTime<Utc>) -> Result<bool> {
        self.inner.delete_unverified(id, cutoff).await
    }

    async fn anonymize_expired(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool> {
        if self.fail_anonymize.lock().contains(&id) {
            return Err(CustomerError::Database("anonymize failed".into()));
        }
        self.inner.anonymize_expired(id, name, email, cutoff).await
    }

    async fn list_frozen_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Customer>> {
        let expired = self.inner.list_frozen_expired(cutoff).await?;
        if self.recover_after_listing.load(Ordering::SeqCst) {
            for customer in &expired {
                self.inner.recover(customer.id).await?;
            }
        }
        Ok(expired)
    }
}

// ============================================================================
// Session store with failure injection
// ============================================================================

#[derive(Default)]
pub struct FlakySessionStore {
    pub inner: InMemorySessionStore,
    pub fail_token_delete: AtomicBool,
    pub fail_increment: AtomicBool,
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn signup_session_set(
        &self,
        temp_token: &str,
        session: &SignupSession,
        ttl: Duration,
    ) -> Result<()> {
        self.inner.signup_session_set(temp_token, session, ttl).await
    }

    async fn signup_session_get(&self, temp_token: &str) -> Result<Option<SignupSession>> {
        self.inner.signup_session_get(temp_token).await
    }

    async fn signup_session_delete(&self, temp_token: &str) -> Result<()> {
        self.inner.signup_session_delete(temp_token).await
    }

    async fn email_verify_token_set(
        &self,
        token: &str,
        customer_id: Uuid,
        ttl: Duration,
    ) -> Result<()> {
        self.inner.email_verify_token_set(token, customer_id, ttl).await
    }

    async fn email_verify_token_get(&self, token: &str) -> Result<Option<Uuid>> {
        self.inner.email_verify_token_get(token).await
    }

    async fn email_verify_token_delete(&self, token: &str) -> Result<()> {
        if self.fail_token_delete.load(Ordering::SeqCst) {
            return Err(CustomerError::Cache("connection reset".into()));
        }
        self.inner.email_verify_token_delete(token).await
    }

    async fn signup_attempt_increment(&self, temp_token: &str, ttl: Duration) -> Result<u64> {
        if self.fail_increment.load(Ordering::SeqCst) {
            return Err(CustomerError::Cache("connection reset".into()));
        }
        self.inner.signup_attempt_increment(temp_token, ttl).await
    }

    async fn signup_attempt_delete(&self, temp_token: &str) -> Result<()> {
        self.inner.signup_attempt_delete(temp_token).await
    }

    async fn verify_lock_acquire(&self, customer_id: Uuid, ttl: Duration) -> Result<Option<String>> {
        self.inner.verify_lock_acquire(customer_id, ttl).await
    }

    async fn verify_lock_release(&self, customer_id: Uuid, holder: &str) -> Result<()> {
        self.inner.verify_lock_release(customer_id, holder).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub customers: Arc<FlakyCustomerRepository>,
    pub sessions: Arc<FlakySessionStore>,
    pub accesskeys: Arc<InMemoryAccesskeyRepository>,
    pub provisioner: Arc<TestProvisioner>,
    pub notifier: Arc<RecordingNotifier>,
    pub directory: Arc<FakeDirectory>,
    pub mailer: Arc<RecordingMailer>,
    pub service: CustomerService,
}

impl Harness {
    pub fn new() -> Self {
        let customers = Arc::new(FlakyCustomerRepository::default());
        let sessions = Arc::new(FlakySessionStore::default());
        let accesskeys = Arc::new(InMemoryAccesskeyRepository::new());
        let provisioner = Arc::new(TestProvisioner::new(accesskeys.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let directory = Arc::new(FakeDirectory::default());
        let mailer = Arc::new(RecordingMailer::default());

        let service = CustomerService::new(
            customers.clone(),
            sessions.clone(),
            provisioner.clone(),
            notifier.clone(),
            directory.clone(),
            mailer.clone(),
            LifecycleSettings {
                email_verify_base_url: "https://console.example.com".to_string(),
                frozen_retention: chrono::Duration::days(30),
            },
        );

        Self {
            customers,
            sessions,
            accesskeys,
            provisioner,
            notifier,
            directory,
            mailer,
            service,
        }
    }

    /// Insert an unverified customer directly into the store.
    pub fn seed_customer(&self, email: &str) -> Customer {
        let customer = Customer::new("Seeded", email);
        self.customers.inner.insert(customer.clone());
        customer
    }

    /// Seed a signup session and its email token for `customer`.
    pub async fn seed_session(&self, customer: &Customer, temp_token: &str, otp: &str) -> String {
        let verify_token = format!("verify-{}", temp_token);
        self.sessions
            .email_verify_token_set(&verify_token, customer.id, Duration::from_secs(3600))
            .await
            .unwrap();
        self.sessions
            .signup_session_set(
                temp_token,
                &SignupSession {
                    customer_id: customer.id,
                    otp_code: otp.to_string(),
                    verify_token: verify_token.clone(),
                },
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
        verify_token
    }

    pub async fn customer(&self, id: Uuid) -> Customer {
        self.customers.inner.get(id).await.unwrap().unwrap()
    }

    pub async fn accesskey_count(&self, customer_id: Uuid) -> usize {
        use cm_customer::AccesskeyRepository;
        self.accesskeys.list_by_customer(customer_id).await.unwrap().len()
    }
}

/// Extract the verification token from an emailed link.
pub fn token_from_email(email: &SentEmail) -> String {
    let marker = "email-verify?token=";
    let start = email.content.find(marker).unwrap() + marker.len();
    email.content[start..]
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect()
}

/// Extract the OTP code from the email subject.
pub fn otp_from_email(email: &SentEmail) -> String {
    email
        .subject
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}

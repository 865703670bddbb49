//! Customer Entity
//!
//! A customer is the tenant account that owns agents, numbers and API keys.
//! Only the lifecycle-relevant attributes live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::validation::normalize_email;

/// Customer status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    /// Account is live
    #[default]
    Active,
    /// Account is suspended and scheduled for anonymization
    Frozen,
    /// Account was reclaimed (terminal)
    Deleted,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Frozen => "frozen",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "frozen" => Some(Self::Frozen),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// HTTP method used when delivering webhooks to the customer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    #[default]
    #[serde(alias = "")]
    None,
    Post,
    Get,
    Put,
    Delete,
}

impl WebhookMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Post => "POST",
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Lenient parse; empty or unknown values map to `None`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "POST" => Self::Post,
            "GET" => Self::Get,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            _ => Self::None,
        }
    }
}

/// Customer entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,

    pub name: String,
    pub detail: String,

    /// Login email; unique among live customers after normalization
    pub email: String,
    pub phone_number: String,
    pub address: String,

    pub webhook_method: WebhookMethod,
    pub webhook_uri: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_account_id: Option<Uuid>,

    /// Flips false -> true once and never reverts
    pub email_verified: bool,

    #[serde(default)]
    pub status: CustomerStatus,

    /// When a frozen account becomes eligible for anonymization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tm_deletion_scheduled: Option<DateTime<Utc>>,

    pub tm_create: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tm_update: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tm_delete: Option<DateTime<Utc>>,
}

impl Customer {
    /// New unverified, active customer with a fresh id.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            detail: String::new(),
            email: email.into(),
            phone_number: String::new(),
            address: String::new(),
            webhook_method: WebhookMethod::None,
            webhook_uri: String::new(),
            billing_account_id: None,
            email_verified: false,
            status: CustomerStatus::Active,
            tm_deletion_scheduled: None,
            tm_create: Utc::now(),
            tm_update: None,
            tm_delete: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = phone_number.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_webhook(mut self, method: WebhookMethod, uri: impl Into<String>) -> Self {
        self.webhook_method = method;
        self.webhook_uri = uri.into();
        self
    }

    /// Deleted either by status or by soft-delete timestamp.
    pub fn is_deleted(&self) -> bool {
        self.status == CustomerStatus::Deleted || self.tm_delete.is_some()
    }

    pub fn is_frozen(&self) -> bool {
        self.status == CustomerStatus::Frozen
    }

    /// Name and email used to scrub this record on reclamation.
    pub fn anonymized_identity(&self) -> (String, String) {
        let prefix: String = self.id.to_string().chars().take(8).collect();
        (
            format!("deleted-user-{}", prefix),
            format!("deleted-{}@removed.invalid", prefix),
        )
    }

    /// Apply an anonymization in place. Mirrors what stores persist.
    pub fn anonymize(&mut self, name: &str, email: &str, now: DateTime<Utc>) {
        self.name = name.to_string();
        self.email = email.to_string();
        self.detail.clear();
        self.phone_number.clear();
        self.address.clear();
        self.webhook_method = WebhookMethod::None;
        self.webhook_uri.clear();
        self.status = CustomerStatus::Deleted;
        self.tm_deletion_scheduled = None;
        self.tm_update = Some(now);
        self.tm_delete = Some(now);
    }
}

/// A single updatable column
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerField {
    Name(String),
    Detail(String),
    Email(String),
    PhoneNumber(String),
    Address(String),
    WebhookMethod(WebhookMethod),
    WebhookUri(String),
    BillingAccountId(Option<Uuid>),
    EmailVerified(bool),
}

impl CustomerField {
    /// Column name in the relational store.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::Detail(_) => "detail",
            Self::Email(_) => "email",
            Self::PhoneNumber(_) => "phone_number",
            Self::Address(_) => "address",
            Self::WebhookMethod(_) => "webhook_method",
            Self::WebhookUri(_) => "webhook_uri",
            Self::BillingAccountId(_) => "billing_account_id",
            Self::EmailVerified(_) => "email_verified",
        }
    }
}

/// Typed partial update of a customer.
///
/// ```rust,ignore
/// let update = CustomerUpdate::new().email_verified(true);
/// repo.update(customer.id, &update).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerUpdate {
    fields: Vec<CustomerField>,
}

impl CustomerUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: CustomerField) -> Self {
        self.fields.retain(|f| f.column() != field.column());
        self.fields.push(field);
        self
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.field(CustomerField::Name(name.into()))
    }

    pub fn detail(self, detail: impl Into<String>) -> Self {
        self.field(CustomerField::Detail(detail.into()))
    }

    pub fn email(self, email: impl Into<String>) -> Self {
        self.field(CustomerField::Email(email.into()))
    }

    pub fn phone_number(self, phone_number: impl Into<String>) -> Self {
        self.field(CustomerField::PhoneNumber(phone_number.into()))
    }

    pub fn address(self, address: impl Into<String>) -> Self {
        self.field(CustomerField::Address(address.into()))
    }

    pub fn webhook(self, method: WebhookMethod, uri: impl Into<String>) -> Self {
        self.field(CustomerField::WebhookMethod(method))
            .field(CustomerField::WebhookUri(uri.into()))
    }

    pub fn billing_account_id(self, id: Option<Uuid>) -> Self {
        self.field(CustomerField::BillingAccountId(id))
    }

    pub fn email_verified(self, verified: bool) -> Self {
        self.field(CustomerField::EmailVerified(verified))
    }

    pub fn fields(&self) -> &[CustomerField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Apply to an in-memory customer. `email_verified` never reverts.
    pub fn apply_to(&self, customer: &mut Customer, now: DateTime<Utc>) {
        for field in &self.fields {
            match field {
                CustomerField::Name(v) => customer.name = v.clone(),
                CustomerField::Detail(v) => customer.detail = v.clone(),
                CustomerField::Email(v) => customer.email = v.clone(),
                CustomerField::PhoneNumber(v) => customer.phone_number = v.clone(),
                CustomerField::Address(v) => customer.address = v.clone(),
                CustomerField::WebhookMethod(v) => customer.webhook_method = *v,
                CustomerField::WebhookUri(v) => customer.webhook_uri = v.clone(),
                CustomerField::BillingAccountId(v) => customer.billing_account_id = *v,
                CustomerField::EmailVerified(v) => customer.email_verified |= *v,
            }
        }
        customer.tm_update = Some(now);
    }
}

/// Query filter for listing customers. Deleted rows are excluded unless
/// `include_deleted` is set.
#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub email: Option<String>,
    pub status: Option<CustomerStatus>,
    pub email_verified: Option<bool>,
    pub created_before: Option<DateTime<Utc>>,
    pub include_deleted: bool,
}

impl CustomerFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match on the normalized email.
    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(normalize_email(email));
        self
    }

    pub fn status(mut self, status: CustomerStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn email_verified(mut self, verified: bool) -> Self {
        self.email_verified = Some(verified);
        self
    }

    pub fn created_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.created_before = Some(cutoff);
        self
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn matches(&self, customer: &Customer) -> bool {
        if !self.include_deleted && customer.is_deleted() {
            return false;
        }
        if let Some(email) = &self.email {
            if &normalize_email(&customer.email) != email {
                return false;
            }
        }
        if let Some(status) = self.status {
            if customer.status != status {
                return false;
            }
        }
        if let Some(verified) = self.email_verified {
            if customer.email_verified != verified {
                return false;
            }
        }
        if let Some(cutoff) = self.created_before {
            if customer.tm_create >= cutoff {
                return false;
            }
        }
        true
    }
}

/// Result of a conditional state transition.
///
/// `applied` is false when the row was not in the expected source state;
/// `current` is the row as it stands after the attempt either way.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub applied: bool,
    pub current: Customer,
}

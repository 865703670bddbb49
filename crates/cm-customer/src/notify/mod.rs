//! Event Notifier
//!
//! Fire-and-forget publication of customer domain events. `publish` never
//! blocks and never fails the caller; adapters log delivery problems.

#[cfg(feature = "amqp")]
pub mod amqp;

#[cfg(feature = "amqp")]
pub use amqp::AmqpEventNotifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::customer::entity::Customer;

/// Name of this service on the event bus
pub const PUBLISHER: &str = "customer-manager";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CustomerCreated,
    CustomerDeleted,
    CustomerFrozen,
    CustomerRecovered,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerCreated => "customer_created",
            Self::CustomerDeleted => "customer_deleted",
            Self::CustomerFrozen => "customer_frozen",
            Self::CustomerRecovered => "customer_recovered",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer domain event
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub time: DateTime<Utc>,
    pub customer: Customer,
    /// Activation came through the OTP path (only meaningful for
    /// `customer_created`)
    pub headless: bool,
}

#[derive(Serialize)]
struct CreatedPayload<'a> {
    customer: &'a Customer,
    headless: bool,
}

impl CustomerEvent {
    fn new(event_type: EventType, customer: Customer, headless: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            time: Utc::now(),
            customer,
            headless,
        }
    }

    pub fn created(customer: Customer, headless: bool) -> Self {
        Self::new(EventType::CustomerCreated, customer, headless)
    }

    pub fn deleted(customer: Customer) -> Self {
        Self::new(EventType::CustomerDeleted, customer, false)
    }

    pub fn frozen(customer: Customer) -> Self {
        Self::new(EventType::CustomerFrozen, customer, false)
    }

    pub fn recovered(customer: Customer) -> Self {
        Self::new(EventType::CustomerRecovered, customer, false)
    }

    /// Event data: `{customer, headless}` for creation, the customer itself
    /// otherwise.
    pub fn data(&self) -> serde_json::Result<serde_json::Value> {
        match self.event_type {
            EventType::CustomerCreated => serde_json::to_value(CreatedPayload {
                customer: &self.customer,
                headless: self.headless,
            }),
            _ => serde_json::to_value(&self.customer),
        }
    }

    /// Wire envelope published to the bus.
    pub fn envelope(&self) -> serde_json::Result<serde_json::Value> {
        Ok(serde_json::json!({
            "type": self.event_type.as_str(),
            "publisher": PUBLISHER,
            "data_type": "application/json",
            "data": self.data()?,
        }))
    }
}

pub trait EventNotifier: Send + Sync {
    fn publish(&self, event: CustomerEvent);
}

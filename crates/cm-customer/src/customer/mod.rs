//! Customer Aggregate
//!
//! Customer accounts and their lifecycle operations.

pub mod entity;
pub mod repository;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod operations;

pub use entity::{Customer, CustomerStatus, WebhookMethod};
pub use repository::CustomerRepository;

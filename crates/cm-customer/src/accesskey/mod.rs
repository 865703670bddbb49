//! Accesskey Aggregate
//!
//! API credentials owned by a customer. Only a hash of the raw token is
//! stored; the token itself is returned once, at creation.

pub mod entity;
pub mod repository;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod provisioner;

pub use entity::{Accesskey, IssuedAccesskey};
pub use provisioner::{AccesskeyProvisioner, RepositoryAccesskeyProvisioner};
pub use repository::{AccesskeyRepository, InMemoryAccesskeyRepository};
#[cfg(feature = "postgres")]
pub use postgres::PostgresAccesskeyRepository;

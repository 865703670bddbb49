//! Shared Module
//!
//! Cross-cutting concerns and shared utilities.

pub mod error;
pub mod token;
pub mod validation;

pub use error::{CustomerError, Result};

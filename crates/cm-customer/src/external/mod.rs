//! External collaborators reached over HTTP.

pub mod directory;
pub mod mailer;

pub use directory::{AgentDirectory, HttpAgentDirectory};
pub use mailer::{EmailSender, HttpEmailSender};

use std::time::Duration;

/// Timeouts shared by the HTTP collaborator clients
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

//! Development stand-ins for the external collaborators.

use async_trait::async_trait;
use tracing::info;

use cm_customer::{AgentDirectory, CustomerEvent, EmailSender, EventNotifier};

pub struct DevEventNotifier;

impl EventNotifier for DevEventNotifier {
    fn publish(&self, event: CustomerEvent) {
        info!(
            event_type = %event.event_type,
            customer_id = %event.customer.id,
            headless = event.headless,
            "DEV: Event published"
        );
    }
}

pub struct DevEmailSender;

#[async_trait]
impl EmailSender for DevEmailSender {
    async fn send(&self, destination: &str, subject: &str, content: &str) -> cm_customer::Result<()> {
        info!(%destination, %subject, %content, "DEV: Email sent");
        Ok(())
    }
}

/// Reports every username as free.
pub struct DevAgentDirectory;

#[async_trait]
impl AgentDirectory for DevAgentDirectory {
    async fn username_exists(&self, _username: &str) -> cm_customer::Result<bool> {
        Ok(false)
    }
}

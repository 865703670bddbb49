//! AMQP event notifier
//!
//! `publish` hands events to a background task over an unbounded channel.
//! The task serializes each event into the bus envelope and publishes it
//! to a durable fanout exchange. Delivery failures are logged and dropped.

use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    ExchangeKind,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{CustomerEvent, EventNotifier};
use crate::shared::error::{CustomerError, Result};

pub struct AmqpEventNotifier {
    tx: mpsc::UnboundedSender<CustomerEvent>,
}

impl AmqpEventNotifier {
    /// Connect, declare the exchange and start the publisher task.
    pub async fn connect(uri: &str, exchange: &str) -> Result<(Self, JoinHandle<()>)> {
        let connection = Connection::connect(
            uri,
            ConnectionProperties::default().with_connection_name("customer-manager".into()),
        )
        .await
        .map_err(|e| CustomerError::Messaging(format!("AMQP connection failed: {}", e)))?;

        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(exchange = %exchange, "AMQP event notifier connected");

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_publisher(connection, channel, exchange.to_string(), rx));

        Ok((Self { tx }, handle))
    }
}

impl EventNotifier for AmqpEventNotifier {
    fn publish(&self, event: CustomerEvent) {
        let event_type = event.event_type;
        if self.tx.send(event).is_err() {
            warn!(event_type = %event_type, "Event publisher stopped, dropping event");
        }
    }
}

async fn run_publisher(
    // Held so the connection lives as long as the task.
    _connection: Connection,
    channel: Channel,
    exchange: String,
    mut rx: mpsc::UnboundedReceiver<CustomerEvent>,
) {
    while let Some(event) = rx.recv().await {
        let body = match event.envelope().and_then(|v| serde_json::to_vec(&v)) {
            Ok(body) => body,
            Err(e) => {
                error!(event_type = %event.event_type, error = %e, "Failed to serialize event");
                continue;
            }
        };

        let result = channel
            .basic_publish(
                &exchange,
                "",
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_message_id(event.event_id.to_string().into())
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await;

        match result {
            Ok(_) => debug!(
                event_type = %event.event_type,
                customer_id = %event.customer.id,
                "Event published"
            ),
            Err(e) => error!(
                event_type = %event.event_type,
                customer_id = %event.customer.id,
                error = %e,
                "Failed to publish event"
            ),
        }
    }

    info!("AMQP event publisher stopped");
}

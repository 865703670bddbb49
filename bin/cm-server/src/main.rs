//! Customer Manager Server
//!
//! Serves the customer lifecycle APIs and runs the expiry janitor:
//! - Signup, email verification and headless signup completion
//! - Freeze / recover of customer accounts
//! - Background reaping of stale signups and expired frozen accounts
//!
//! ## Configuration
//!
//! Loaded from TOML (see `cm-config`) with `CUSTOMER_MANAGER_*` overrides.
//! With `dev_mode = true` every store is in memory and the external
//! collaborators are replaced by logging stand-ins.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CUSTOMER_MANAGER_CONFIG` | - | Path to the config file |
//! | `CUSTOMER_MANAGER_HTTP_PORT` | `8080` | HTTP API port |
//! | `CUSTOMER_MANAGER_DEV_MODE` | `false` | In-memory development mode |
//! | `LOG_FORMAT` | `text` | `json` for structured output |
//! | `RUST_LOG` | `info` | Log level |

mod api;
mod dev;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tracing::{info, warn};

use cm_config::AppConfig;
use cm_customer::accesskey::PostgresAccesskeyRepository;
use cm_customer::external::{HttpAgentDirectory, HttpEmailSender};
use cm_customer::notify::AmqpEventNotifier;
use cm_customer::{
    AccesskeyRepository, AgentDirectory, CustomerRepository, CustomerService, EmailSender,
    EventNotifier, ExpiryJanitor, InMemoryAccesskeyRepository, InMemoryCustomerRepository,
    InMemorySessionStore, JanitorSettings, LifecycleSettings, PostgresCustomerRepository,
    RepositoryAccesskeyProvisioner, SessionStore,
};
use cm_session::{RedisSessionConfig, RedisSessionStore};

/// Wait for queued events to flush on shutdown.
const PUBLISHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

struct Stores {
    customers: Arc<dyn CustomerRepository>,
    accesskeys: Arc<dyn AccesskeyRepository>,
    sessions: Arc<dyn SessionStore>,
}

struct Collaborators {
    notifier: Arc<dyn EventNotifier>,
    directory: Arc<dyn AgentDirectory>,
    mailer: Arc<dyn EmailSender>,
    publisher: Option<JoinHandle<()>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    cm_common::logging::init_logging("cm-server");

    info!("Starting Customer Manager");

    let config = AppConfig::load()?;
    info!(
        dev_mode = config.dev_mode,
        janitor_enabled = config.janitor.enabled,
        "Configuration loaded"
    );

    let stores = if config.dev_mode {
        warn!("Running in dev mode: all state is in memory");
        in_memory_stores()
    } else {
        connect_stores(&config).await?
    };

    let Collaborators {
        notifier,
        directory,
        mailer,
        publisher,
    } = if config.dev_mode {
        dev_collaborators()
    } else {
        connect_collaborators(&config).await?
    };

    let provisioner = Arc::new(RepositoryAccesskeyProvisioner::new(stores.accesskeys));

    let settings = LifecycleSettings {
        email_verify_base_url: config.email.verify_base_url.clone(),
        frozen_retention: frozen_retention(&config)?,
    };

    let service = Arc::new(CustomerService::new(
        stores.customers.clone(),
        stores.sessions,
        provisioner,
        notifier.clone(),
        directory,
        mailer,
        settings,
    ));

    let janitor = if config.janitor.enabled {
        Some(ExpiryJanitor::start(
            stores.customers,
            notifier.clone(),
            JanitorSettings {
                unverified_interval: Duration::from_secs(config.janitor.unverified_interval_secs),
                unverified_max_age: unverified_max_age(&config)?,
                frozen_interval: Duration::from_secs(config.janitor.frozen_interval_secs),
            },
        ))
    } else {
        info!("Expiry janitor disabled");
        None
    };

    let app = api::router(service);

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse()?;
    info!("API server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown signal received...");

    if let Some(janitor) = janitor {
        janitor.shutdown().await;
    }

    // The publisher task exits once the last notifier handle is gone.
    drop(notifier);
    if let Some(publisher) = publisher {
        if tokio::time::timeout(PUBLISHER_DRAIN_TIMEOUT, publisher).await.is_err() {
            warn!("Event publisher did not drain before timeout");
        }
    }

    info!("Customer Manager shutdown complete");
    Ok(())
}

fn frozen_retention(config: &AppConfig) -> Result<chrono::Duration> {
    chrono::Duration::try_days(config.lifecycle.frozen_retention_days)
        .context("lifecycle.frozen_retention_days out of range")
}

fn unverified_max_age(config: &AppConfig) -> Result<chrono::Duration> {
    i64::try_from(config.lifecycle.unverified_max_age_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .context("lifecycle.unverified_max_age_secs out of range")
}

fn in_memory_stores() -> Stores {
    Stores {
        customers: Arc::new(InMemoryCustomerRepository::new()),
        accesskeys: Arc::new(InMemoryAccesskeyRepository::new()),
        sessions: Arc::new(InMemorySessionStore::new()),
    }
}

async fn connect_stores(config: &AppConfig) -> Result<Stores> {
    info!("Connecting to PostgreSQL");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;

    let customers = PostgresCustomerRepository::new(pool.clone());
    customers.init_schema().await?;
    let accesskeys = PostgresAccesskeyRepository::new(pool);
    accesskeys.init_schema().await?;

    info!("Connecting to Redis");
    let sessions = RedisSessionStore::new(
        RedisSessionConfig::new(config.redis.url.clone())
            .with_key_prefix(config.redis.key_prefix.clone()),
    )
    .await?;

    Ok(Stores {
        customers: Arc::new(customers),
        accesskeys: Arc::new(accesskeys),
        sessions: Arc::new(sessions),
    })
}

fn dev_collaborators() -> Collaborators {
    Collaborators {
        notifier: Arc::new(dev::DevEventNotifier),
        directory: Arc::new(dev::DevAgentDirectory),
        mailer: Arc::new(dev::DevEmailSender),
        publisher: None,
    }
}

async fn connect_collaborators(config: &AppConfig) -> Result<Collaborators> {
    info!(exchange = %config.amqp.exchange, "Connecting to AMQP");
    let (notifier, publisher) =
        AmqpEventNotifier::connect(&config.amqp.uri, &config.amqp.exchange).await?;

    Ok(Collaborators {
        notifier: Arc::new(notifier),
        directory: Arc::new(HttpAgentDirectory::new(config.directory.url.clone())?),
        mailer: Arc::new(HttpEmailSender::new(config.email.service_url.clone())?),
        publisher: Some(publisher),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

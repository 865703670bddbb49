//! Expiry Janitor
//!
//! Two independent background sweeps:
//! - [`UnverifiedReaper`] hard-deletes signups that were never verified
//! - [`FrozenExpirySweep`] anonymizes frozen customers whose deletion
//!   schedule has passed
//!
//! Each sweep runs once on start and then every interval until the shared
//! [`CancellationToken`] is cancelled. A failing record is logged and the
//! sweep moves on.

mod frozen;
mod unverified;

pub use frozen::FrozenExpirySweep;
pub use unverified::UnverifiedReaper;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::customer::repository::CustomerRepository;
use crate::notify::EventNotifier;
use crate::shared::error::Result;

#[derive(Debug, Clone)]
pub struct JanitorSettings {
    pub unverified_interval: Duration,
    /// Unverified customers older than this are reaped
    pub unverified_max_age: chrono::Duration,
    pub frozen_interval: Duration,
}

impl Default for JanitorSettings {
    fn default() -> Self {
        Self {
            unverified_interval: Duration::from_secs(15 * 60),
            unverified_max_age: chrono::Duration::hours(1),
            frozen_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Owns the sweep tasks.
pub struct ExpiryJanitor {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl ExpiryJanitor {
    /// Spawn both sweeps on the current runtime.
    pub fn start(
        customers: Arc<dyn CustomerRepository>,
        notifier: Arc<dyn EventNotifier>,
        settings: JanitorSettings,
    ) -> Self {
        let shutdown = CancellationToken::new();

        let reaper = UnverifiedReaper::new(customers.clone(), settings.unverified_max_age);
        let sweep = FrozenExpirySweep::new(customers, notifier);

        info!(
            unverified_interval_secs = settings.unverified_interval.as_secs(),
            frozen_interval_secs = settings.frozen_interval.as_secs(),
            "Starting expiry janitor"
        );

        let handles = vec![
            tokio::spawn(run_periodic(
                "unverified-reaper",
                settings.unverified_interval,
                shutdown.clone(),
                move || {
                    let reaper = reaper.clone();
                    async move { reaper.run_once().await }
                },
            )),
            tokio::spawn(run_periodic(
                "frozen-expiry",
                settings.frozen_interval,
                shutdown.clone(),
                move || {
                    let sweep = sweep.clone();
                    async move { sweep.run_once().await }
                },
            )),
        ];

        Self { shutdown, handles }
    }

    /// Token observed by the sweeps; cancelling it stops them.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel both sweeps and wait for them to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Janitor task failed");
            }
        }
        info!("Expiry janitor stopped");
    }
}

async fn run_periodic<F, Fut>(
    name: &'static str,
    interval: Duration,
    shutdown: CancellationToken,
    mut sweep: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<usize>>,
{
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        if let Err(e) = sweep().await {
            error!(sweep = name, error = %e, "Janitor sweep failed");
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = shutdown.cancelled() => break,
        }
    }

    info!(sweep = name, "Janitor sweep shutting down");
}

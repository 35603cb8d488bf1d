//! Background maintenance
//!
//! One task, one interval: sweep dead sessions from both backends and drop
//! rate-limit buckets whose window has passed. A failed tick is logged and
//! the next one runs as usual.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::application::email::EmailSender;
use crate::application::gateway::AuthGateway;
use crate::infra::dual::PrimaryStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub sessions_removed: u64,
    pub buckets_removed: usize,
}

impl<P, E> AuthGateway<P, E>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let sessions_removed = match self.store.sweep_all().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "Session sweep failed");
                0
            }
        };
        let buckets_removed = self.auth_limiter.cleanup() + self.user_limiter.cleanup();

        let report = MaintenanceReport {
            sessions_removed,
            buckets_removed,
        };
        tracing::debug!(?report, "Maintenance tick");
        report
    }
}

/// Run maintenance every `config.maintenance_interval` until the runtime
/// shuts down.
pub fn spawn_maintenance<P, E>(gateway: Arc<AuthGateway<P, E>>) -> JoinHandle<()>
where
    P: PrimaryStore,
    E: EmailSender + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(gateway.config().maintenance_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup isn't doing a sweep.
        interval.tick().await;

        loop {
            interval.tick().await;
            let report = gateway.run_maintenance().await;
            if report.sessions_removed > 0 {
                tracing::info!(
                    sessions_removed = report.sessions_removed,
                    buckets_removed = report.buckets_removed,
                    "Expired sessions swept"
                );
            }
        }
    })
}

//! Background lifecycle tasks.
//!
//! Currently one: periodic pruning of terminal task-registry records, so
//! the registry does not grow without bound under sustained traffic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::registry::TaskRegistry;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Interval between registry prune passes
    pub registry_prune_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            registry_prune_interval: Duration::from_secs(300),
        }
    }
}

pub struct LifecycleManager {
    shutdown_tx: broadcast::Sender<()>,
}

impl LifecycleManager {
    /// Start all background tasks
    pub fn start(registry: Arc<TaskRegistry>, config: LifecycleConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        {
            let registry = registry.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();
            let interval = config.registry_prune_interval;

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            debug!("Running registry prune");
                            registry.prune_terminal();
                        }
                        _ = shutdown_rx.recv() => {
                            info!("Registry pruner shutting down");
                            break;
                        }
                    }
                }
            });
        }

        info!("Lifecycle manager started");
        Self { shutdown_tx }
    }

    /// Signal shutdown to all lifecycle tasks
    pub async fn shutdown(&self) {
        info!("Lifecycle manager shutting down...");
        let _ = self.shutdown_tx.send(());
    }
}

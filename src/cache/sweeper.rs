use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::FailedOperationCache;

/// Background task that periodically evicts failed operations older than the retry TTL
pub struct Sweeper {
    cache: FailedOperationCache,
    ttl: Duration,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown: Mutex<Option<mpsc::Sender<()>>>,
}

impl Sweeper {
    pub fn new(cache: FailedOperationCache, ttl: Duration, period: Duration) -> Self {
        Self {
            cache,
            ttl,
            period,
            task: Mutex::new(None),
            shutdown: Mutex::new(None),
        }
    }

    /// Run one sweep immediately
    pub fn sweep_now(&self) -> usize {
        self.cache.sweep(self.ttl)
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Start the periodic sweep task
    pub async fn start(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Err(anyhow!("Sweeper already running"));
        }
        if self.period.is_zero() {
            return Err(anyhow!("Sweep period must be greater than zero"));
        }

        info!(
            ttl_secs = self.ttl.as_secs(),
            period_secs = self.period.as_secs(),
            "Starting failed-operation sweeper"
        );

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown.lock().await = Some(shutdown_tx);

        let cache = self.cache.clone();
        let ttl = self.ttl;
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        *task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep(ttl);
                        debug!(removed, "Periodic sweep finished");
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Failed-operation sweeper shutting down");
                        break;
                    }
                }
            }
        }));

        Ok(())
    }

    /// Stop the periodic sweep task and wait for it to finish
    pub async fn stop(&self) -> Result<()> {
        let handle = self.task.lock().await.take();
        let Some(handle) = handle else {
            return Err(anyhow!("Sweeper not running"));
        };

        if let Some(shutdown_tx) = self.shutdown.lock().await.take() {
            let _ = shutdown_tx.send(()).await;
        }
        let _ = handle.await;

        Ok(())
    }
}

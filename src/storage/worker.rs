use crate::core::{Result, StoreError};
use crate::facade::CycleStore;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Level, event};

/// Background task running the periodic sweep of a store.
pub struct SweepWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl SweepWorker {
    /// Signals the worker to stop and waits for it to finish.
    ///
    /// A sweep that is already running completes first.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(join_handle) = self.join_handle.take() {
            join_handle
                .await
                .map_err(|err| StoreError::Storage(format!("sweep worker join: {}", err)))?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for SweepWorker {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}

/// Spawns the sweep loop on the current tokio runtime.
///
/// The first sweep happens one full interval after spawning. A zero interval
/// is raised to one millisecond.
pub fn spawn_sweep_worker(store: CycleStore) -> SweepWorker {
    let period = store.config().sweep_interval.max(Duration::from_millis(1));
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let join_handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    event!(Level::DEBUG, "sweep worker stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let store = store.clone();
                    let outcome = tokio::task::spawn_blocking(move || store.sweep()).await;
                    match outcome {
                        Ok(Ok(_)) => {}
                        Ok(Err(err)) => {
                            event!(Level::WARN, error = %err, "sweep failed");
                        }
                        Err(err) => {
                            event!(Level::ERROR, error = %err, "sweep task panicked");
                        }
                    }
                }
            }
        }
    });

    SweepWorker {
        stop_tx: Some(stop_tx),
        join_handle: Some(join_handle),
    }
}

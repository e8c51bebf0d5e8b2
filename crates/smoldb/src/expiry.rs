//! Expiration timers
//!
//! A store with a TTL starts one scheduler on its first expiring `set`. The
//! scheduler owns a `smoldb-expiry` thread running a current-thread tokio
//! runtime; every scheduled deletion becomes a sleeping task on it.
//!
//! Timers are never cancelled individually. A timer that fires after its key
//! was refreshed or deleted finds a different generation in the store and
//! does nothing. Dropping the scheduler closes its channel, which ends the
//! runtime and drops every pending timer.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{trace, warn};

type Handler<K> = Arc<dyn Fn(K, u64) + Send + Sync>;

struct Task<K> {
    key: K,
    generation: u64,
    deadline: Instant,
}

/// Handle to the timer thread.
pub(crate) struct Scheduler<K> {
    tx: mpsc::UnboundedSender<Task<K>>,
}

impl<K: Send + 'static> Scheduler<K> {
    /// Spawns the timer thread. `handler` runs once per fired timer, on the
    /// timer thread.
    pub(crate) fn start<F>(handler: F) -> io::Result<Self>
    where
        F: Fn(K, u64) + Send + Sync + 'static,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Task<K>>();
        let handler: Handler<K> = Arc::new(handler);

        thread::Builder::new()
            .name("smoldb-expiry".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(task) = rx.recv().await {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            tokio::time::sleep_until(tokio::time::Instant::from_std(task.deadline))
                                .await;
                            fire(&handler, task.key, task.generation);
                        });
                    }
                });
                trace!("expiration scheduler stopped");
            })?;

        Ok(Self { tx })
    }

    /// Arms a deletion of `key` at `generation` after `delay`.
    pub(crate) fn schedule(&self, key: K, generation: u64, delay: Duration) {
        let task = Task {
            key,
            generation,
            deadline: Instant::now() + delay,
        };
        if self.tx.send(task).is_err() {
            warn!(generation, "expiration scheduler is gone, timer dropped");
        }
    }
}

/// Runs the handler, containing any panic to this one timer.
fn fire<K>(handler: &Handler<K>, key: K, generation: u64) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(key, generation)));
    if let Err(payload) = outcome {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(generation, panic = %message, "expiration handler panicked");
    }
}

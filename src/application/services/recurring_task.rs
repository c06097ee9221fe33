//! Cancellable background jobs.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

/// Handle to a spawned background job.
///
/// Dropping the handle cancels the job.
pub struct RecurringTask {
    name: &'static str,
    cancel_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for RecurringTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurringTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl RecurringTask {
    /// Runs `job` every `period`, first after one full period.
    ///
    /// A slow job delays the next tick instead of bunching ticks up.
    pub fn every<F, Fut>(name: &'static str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => job().await,
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!(task = name, "Recurring task stopped");
        });

        Self {
            name,
            cancel_tx,
            handle: Some(handle),
        }
    }

    /// Runs `job` with each new value published on `signal`.
    pub fn on_change<T, F, Fut>(
        name: &'static str,
        mut signal: watch::Receiver<T>,
        mut job: F,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = signal.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let value = signal.borrow_and_update().clone();
                        job(value).await;
                    }
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!(task = name, "Signal task stopped");
        });

        Self {
            name,
            cancel_tx,
            handle: Some(handle),
        }
    }

    /// Task name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Stops the job after its current run, if any.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Returns true once the job has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancels the job and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RecurringTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_period_until_cancelled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = RecurringTask::every("test", Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        task.shutdown().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_on_change_sees_each_value() {
        let (tx, rx) = watch::channel(false);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        let task = RecurringTask::on_change("signal", rx, move |online: bool| {
            let sink = sink.clone();
            let done_tx = done_tx.clone();
            async move {
                sink.lock().push(online);
                let _ = done_tx.send(());
            }
        });

        tx.send(true).unwrap();
        done_rx.recv().await.unwrap();
        tx.send(false).unwrap();
        done_rx.recv().await.unwrap();

        assert_eq!(*seen.lock(), vec![true, false]);
        task.shutdown().await;
    }
}

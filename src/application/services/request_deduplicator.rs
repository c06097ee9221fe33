//! Collapses concurrent identical requests into one in-flight future.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::trace;

type SharedResult<V> = Shared<BoxFuture<'static, V>>;

struct Slot<V> {
    generation: u64,
    future: SharedResult<V>,
}

type SlotMap<V> = Mutex<HashMap<String, Slot<V>>>;

/// Shares one producer run between every caller using the same key.
///
/// After the producer completes, the key keeps answering with the finished
/// value for `ttl` before it is evicted. Failures are shared the same way, so
/// `V` is usually a `Result` with a cloneable error.
pub struct RequestDeduplicator<V> {
    slots: Arc<SlotMap<V>>,
    generation: AtomicU64,
}

impl<V> Default for RequestDeduplicator<V> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }
}

impl<V> RequestDeduplicator<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `producer` unless a run for `key` is in flight or recently finished.
    ///
    /// Eviction after completion needs a Tokio runtime.
    pub async fn run<F, Fut>(&self, key: &str, producer: F, ttl: Duration) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let future = {
            let mut slots = self.slots.lock();
            if let Some(slot) = slots.get(key) {
                trace!(key = key, "Joining in-flight request");
                slot.future.clone()
            } else {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let future = Self::wrap(
                    producer(),
                    Arc::downgrade(&self.slots),
                    key.to_string(),
                    generation,
                    ttl,
                );
                slots.insert(
                    key.to_string(),
                    Slot {
                        generation,
                        future: future.clone(),
                    },
                );
                future
            }
        };

        future.await
    }

    fn wrap<Fut>(
        producer: Fut,
        slots: Weak<SlotMap<V>>,
        key: String,
        generation: u64,
        ttl: Duration,
    ) -> SharedResult<V>
    where
        Fut: Future<Output = V> + Send + 'static,
    {
        async move {
            let value = producer.await;
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                let Some(slots) = slots.upgrade() else {
                    return;
                };
                let mut slots = slots.lock();
                if slots
                    .get(&key)
                    .is_some_and(|slot| slot.generation == generation)
                {
                    slots.remove(&key);
                    trace!(key = %key, "Evicted finished request");
                }
            });
            value
        }
        .boxed()
        .shared()
    }

    /// Number of keys currently in flight or inside their grace period.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns true if no key is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_run() {
        let dedup = RequestDeduplicator::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let producer = || {
            let calls = calls.clone();
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                42
            }
        };

        let ttl = Duration::from_millis(50);
        let (a, b) = tokio::join!(
            dedup.run("slide:intro", producer(), ttl),
            dedup.run("slide:intro", producer(), ttl)
        );

        assert_eq!(a, 42);
        assert_eq!(b, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_result_is_reused_within_ttl() {
        let dedup = RequestDeduplicator::<Result<u32, String>>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_millis(500);

        for _ in 0..2 {
            let calls = calls.clone();
            let value = dedup
                .run(
                    "key",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<u32, _>("offline".to_string())
                    },
                    ttl,
                )
                .await;
            assert_eq!(value, Err("offline".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(dedup.is_empty());

        let calls_after = calls.clone();
        dedup
            .run(
                "key",
                move || async move {
                    calls_after.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                },
                ttl,
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let dedup = RequestDeduplicator::<&'static str>::new();
        let ttl = Duration::from_millis(10);
        let (a, b) = tokio::join!(
            dedup.run("a", || async { "first" }, ttl),
            dedup.run("b", || async { "second" }, ttl)
        );
        assert_eq!((a, b), ("first", "second"));
    }
}

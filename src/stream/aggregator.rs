//! Time-windowed text coalescing.
//!
//! Fragments are appended to a buffer and released to a [`FlushTarget`]
//! either when the window elapses or when the owner forces a flush. Every
//! flush of one aggregator runs behind the same async gate, so the target
//! never observes two flushes at once and sees text in append order.

use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Receives coalesced text. Called with non-empty text only.
#[async_trait]
pub trait FlushTarget: Send + Sync + 'static {
    async fn flush_text(&self, text: String) -> Result<()>;
}

#[derive(Default)]
struct Pending {
    buffer: String,
    /// Armed timer, tagged with the generation it was armed under.
    timer: Option<(u64, JoinHandle<()>)>,
    generation: u64,
    /// Failure of a timer-fired flush, reported by the next call.
    deferred: Option<Error>,
}

struct Inner {
    interval: Duration,
    target: Arc<dyn FlushTarget>,
    pending: Mutex<Pending>,
    gate: tokio::sync::Mutex<()>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `fired_by` is the generation of the timer running this flush, `None`
    /// for a forced flush.
    async fn flush(&self, fired_by: Option<u64>) -> Result<()> {
        let _gate = self.gate.lock().await;
        let text = {
            let mut pending = self.lock();
            match fired_by {
                Some(generation) => {
                    if matches!(pending.timer, Some((armed, _)) if armed == generation) {
                        pending.timer = None;
                    }
                }
                None => {
                    if let Some((_, handle)) = pending.timer.take() {
                        handle.abort();
                    }
                }
            }
            std::mem::take(&mut pending.buffer)
        };

        if text.is_empty() {
            return Ok(());
        }
        self.target.flush_text(text).await
    }

    fn take_deferred(&self) -> Result<()> {
        match self.lock().deferred.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Coalesces text fragments into fewer, larger deltas.
///
/// An interval of zero disables buffering: every fragment is flushed as it
/// is added.
pub struct TextAggregator {
    inner: Arc<Inner>,
}

impl TextAggregator {
    pub fn new(interval: Duration, target: Arc<dyn FlushTarget>) -> Self {
        Self {
            inner: Arc::new(Inner {
                interval,
                target,
                pending: Mutex::new(Pending::default()),
                gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Appends `fragment` and arms the window timer if it is not armed.
    /// Empty fragments are ignored.
    pub async fn add(&self, fragment: &str) -> Result<()> {
        self.inner.take_deferred()?;
        if fragment.is_empty() {
            return Ok(());
        }
        if self.inner.interval.is_zero() {
            self.inner.lock().buffer.push_str(fragment);
            return self.inner.flush(None).await;
        }

        let mut pending = self.inner.lock();
        pending.buffer.push_str(fragment);
        if pending.timer.is_none() {
            pending.generation += 1;
            let generation = pending.generation;
            let handle = self.spawn_timer(generation);
            pending.timer = Some((generation, handle));
        }
        Ok(())
    }

    /// Cancels any pending timer and releases buffered text immediately.
    /// Waits for an in-progress timer flush first.
    pub async fn flush(&self) -> Result<()> {
        self.inner.take_deferred()?;
        self.inner.flush(None).await
    }

    /// Drops buffered text and stops the timer without flushing.
    pub fn cancel(&self) {
        let mut pending = self.inner.lock();
        if let Some((_, handle)) = pending.timer.take() {
            handle.abort();
        }
        pending.buffer.clear();
        pending.deferred = None;
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.lock().buffer.is_empty()
    }

    fn spawn_timer(&self, generation: u64) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(e) = inner.flush(Some(generation)).await {
                warn!(error = %e, "timed text flush failed");
                inner.lock().deferred = Some(e);
            }
        })
    }
}

impl Drop for TextAggregator {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.inner.lock().timer.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        flushed: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Recorder {
        fn flushed(&self) -> Vec<String> {
            self.flushed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FlushTarget for Recorder {
        async fn flush_text(&self, text: String) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.flushed.lock().unwrap().push(text);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl FlushTarget for Failing {
        async fn flush_text(&self, _text: String) -> Result<()> {
            Err(Error::Sink("closed".into()))
        }
    }

    #[tokio::test]
    async fn test_fragments_within_window_coalesce() {
        let recorder = Arc::new(Recorder::default());
        let agg = TextAggregator::new(Duration::from_millis(20), recorder.clone());

        agg.add("He").await.unwrap();
        agg.add("llo").await.unwrap();
        assert!(recorder.flushed().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.flushed(), vec!["Hello".to_string()]);
        assert!(!agg.has_pending());
    }

    #[tokio::test]
    async fn test_forced_flush_cancels_timer() {
        let recorder = Arc::new(Recorder::default());
        let agg = TextAggregator::new(Duration::from_millis(30), recorder.clone());

        agg.add("a").await.unwrap();
        agg.flush().await.unwrap();
        assert_eq!(recorder.flushed(), vec!["a".to_string()]);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(recorder.flushed().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_interval_flushes_each_fragment() {
        let recorder = Arc::new(Recorder::default());
        let agg = TextAggregator::new(Duration::ZERO, recorder.clone());

        agg.add("x").await.unwrap();
        agg.add("").await.unwrap();
        agg.add("y").await.unwrap();
        assert_eq!(recorder.flushed(), vec!["x".to_string(), "y".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_flush_does_not_call_target() {
        let recorder = Arc::new(Recorder::default());
        let agg = TextAggregator::new(Duration::from_millis(10), recorder.clone());
        agg.flush().await.unwrap();
        agg.flush().await.unwrap();
        assert!(recorder.flushed().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_flushes_are_serialized() {
        let recorder = Arc::new(Recorder::default());
        let agg = Arc::new(TextAggregator::new(Duration::from_millis(1), recorder.clone()));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let agg = agg.clone();
            tasks.push(tokio::spawn(async move {
                agg.add(&i.to_string()).await.unwrap();
                agg.flush().await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        agg.flush().await.unwrap();

        assert_eq!(recorder.max_in_flight.load(Ordering::SeqCst), 1);
        let joined: String = recorder.flushed().concat();
        let mut digits: Vec<char> = joined.chars().collect();
        digits.sort_unstable();
        assert_eq!(digits.into_iter().collect::<String>(), "01234567");
    }

    #[tokio::test]
    async fn test_cancel_discards_buffer() {
        let recorder = Arc::new(Recorder::default());
        let agg = TextAggregator::new(Duration::from_millis(10), recorder.clone());
        agg.add("dropped").await.unwrap();
        agg.cancel();
        tokio::time::sleep(Duration::from_millis(40)).await;
        agg.flush().await.unwrap();
        assert!(recorder.flushed().is_empty());
    }

    #[tokio::test]
    async fn test_timer_failure_surfaces_on_next_call() {
        let agg = TextAggregator::new(Duration::from_millis(5), Arc::new(Failing));
        agg.add("x").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(matches!(agg.flush().await, Err(Error::Sink(_))));
        assert!(agg.flush().await.is_ok());
    }
}

use super::events::QuotaEvent;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, info, warn};

/// A telemetry sink that consumes quota events.
pub trait TelemetrySink:
    tower::Service<QuotaEvent, Response = (), Error = Self::SinkError> + Clone + Send + Sync + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Deliver `event` to `sink`, never failing the caller.
///
/// A sink that refuses readiness or fails the call costs one debug line; the event is dropped.
pub async fn emit_best_effort<S>(sink: S, event: QuotaEvent)
where
    S: tower::Service<QuotaEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    let kind = event.kind();
    let delivered = match sink.ready_oneshot().await {
        Ok(mut ready) => ready.call(event).await,
        Err(e) => Err(e),
    };
    if let Err(e) = delivered {
        debug!(target: "tierquota::telemetry", kind, error = %e, "quota event dropped");
    }
}

pub(crate) type SinkFuture<E> = Pin<Box<dyn std::future::Future<Output = Result<(), E>> + Send>>;

/// Implements an always-ready, infallible `Service<QuotaEvent>` over a `record` method that
/// does its work synchronously in `call`.
macro_rules! synchronous_sink {
    ($($sink:ty),+ $(,)?) => {$(
        impl Service<QuotaEvent> for $sink {
            type Response = ();
            type Error = Infallible;
            type Future = SinkFuture<Infallible>;

            fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, event: QuotaEvent) -> Self::Future {
                self.record(event);
                Box::pin(std::future::ready(Ok(())))
            }
        }

        impl TelemetrySink for $sink {
            type SinkError = Infallible;
        }
    )+};
}

synchronous_sink!(NullSink, LogSink, MemorySink);

/// Discards every event. The evaluator's default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl NullSink {
    fn record(&self, _event: QuotaEvent) {}
}

/// Writes each event as a structured `tracing` record under `tierquota::telemetry`.
///
/// Denials log at `warn`, registrations and resets at `info`, grants and window resets at
/// `debug`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl LogSink {
    fn record(&self, event: QuotaEvent) {
        match event {
            QuotaEvent::Registered { user_id, tier } => {
                info!(target: "tierquota::telemetry", user_id = %user_id, tier = %tier, "user registered");
            }
            QuotaEvent::Allowed { user_id, category, amount_consumed, remaining } => {
                debug!(
                    target: "tierquota::telemetry",
                    user_id = %user_id,
                    category = %category,
                    amount_consumed,
                    remaining,
                    "consumption allowed"
                );
            }
            QuotaEvent::WindowReset { user_id, category, previous_amount } => {
                debug!(
                    target: "tierquota::telemetry",
                    user_id = %user_id,
                    category = %category,
                    previous_amount,
                    "quota window opened"
                );
            }
            QuotaEvent::LimitExceeded { user_id, category, amount_consumed, available_in } => {
                warn!(
                    target: "tierquota::telemetry",
                    user_id = %user_id,
                    category = %category,
                    amount_consumed,
                    available_in_ms = u64::try_from(available_in.as_millis()).unwrap_or(u64::MAX),
                    "quota limit exceeded"
                );
            }
            QuotaEvent::StoreReset => {
                info!(target: "tierquota::telemetry", "quota store reset");
            }
        }
    }
}

/// Bounded ring of the most recent events, for tests and diagnostics. Clones share the ring.
#[derive(Clone, Debug)]
pub struct MemorySink {
    ring: Arc<Mutex<VecDeque<QuotaEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1_024)))),
            capacity,
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot, oldest first.
    pub fn events(&self) -> Vec<QuotaEvent> {
        self.ring().iter().cloned().collect()
    }

    /// Retained events of one [`QuotaEvent::kind`].
    pub fn count(&self, kind: &str) -> usize {
        self.ring().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.ring().clear();
    }

    pub fn len(&self) -> usize {
        self.ring().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events pushed out of the ring since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    fn record(&self, event: QuotaEvent) {
        let mut ring = self.ring();
        if ring.len() == self.capacity {
            ring.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        ring.push_back(event);
    }

    fn ring(&self) -> MutexGuard<'_, VecDeque<QuotaEvent>> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

//! Mock fetcher for testing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::fetcher::{FetchError, FetchErrorKind, Fetcher};

/// What the mock does for a target once its delay has elapsed.
#[derive(Debug, Clone)]
enum MockResponse {
    Value(Value),
    Error(FetchErrorKind),
    Panic,
}

#[derive(Debug, Default)]
struct MockStats {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: AtomicU64,
    cancelled: AtomicU64,
}

/// Counts a fetch as in flight until dropped, including when the caller
/// drops the fetch future mid-way.
struct InFlightGuard(Arc<MockStats>);

impl InFlightGuard {
    fn enter(stats: &Arc<MockStats>) -> Self {
        let current = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        Self(Arc::clone(stats))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the Fetcher trait.
///
/// Provides controllable behavior for testing:
/// - Per-target values, errors, delays and panics
/// - Targets without a configured response echo `{"url": target}`
/// - A hold switch that parks every fetch until released
/// - In-flight and peak in-flight counters for concurrency assertions
///
/// Delays honor both the fetch timeout and the cancellation scope, like a
/// real network call would.
///
/// # Example
///
/// ```rust,ignore
/// use multiplexer_core::testing::MockFetcher;
///
/// let fetcher = MockFetcher::new();
/// fetcher.set_response("A", json!({"x": 1})).await;
/// fetcher.set_delay("B", Duration::from_secs(5)).await;
///
/// // ... run a batch ...
/// assert!(fetcher.peak_in_flight() <= 4);
/// ```
#[derive(Clone)]
pub struct MockFetcher {
    responses: Arc<RwLock<HashMap<String, MockResponse>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,
    default_delay: Arc<RwLock<Duration>>,
    calls: Arc<RwLock<Vec<String>>>,
    hold: Arc<watch::Sender<bool>>,
    stats: Arc<MockStats>,
}

impl std::fmt::Debug for MockFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFetcher")
            .field("responses", &"<responses>")
            .field("delays", &"<delays>")
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        let (hold, _) = watch::channel(false);
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            delays: Arc::new(RwLock::new(HashMap::new())),
            default_delay: Arc::new(RwLock::new(Duration::ZERO)),
            calls: Arc::new(RwLock::new(Vec::new())),
            hold: Arc::new(hold),
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Return `value` for `target`.
    pub async fn set_response(&self, target: &str, value: Value) {
        self.responses
            .write()
            .await
            .insert(target.to_string(), MockResponse::Value(value));
    }

    /// Fail `target` with `kind`.
    pub async fn set_error(&self, target: &str, kind: FetchErrorKind) {
        self.responses
            .write()
            .await
            .insert(target.to_string(), MockResponse::Error(kind));
    }

    /// Panic while fetching `target`.
    pub async fn set_panic(&self, target: &str) {
        self.responses
            .write()
            .await
            .insert(target.to_string(), MockResponse::Panic);
    }

    /// Delay the response for `target`.
    pub async fn set_delay(&self, target: &str, delay: Duration) {
        self.delays.write().await.insert(target.to_string(), delay);
    }

    /// Delay for targets without their own delay.
    pub async fn set_default_delay(&self, delay: Duration) {
        *self.default_delay.write().await = delay;
    }

    /// Park every fetch (new and in-flight) until [`release`](Self::release).
    pub fn hold(&self) {
        self.hold.send_replace(true);
    }

    pub fn release(&self) {
        self.hold.send_replace(false);
    }

    /// Targets fetched so far, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Fetches that ran to the end of their delay.
    pub fn completed(&self) -> u64 {
        self.stats.completed.load(Ordering::SeqCst)
    }

    /// Fetches that observed cancellation through their scope.
    ///
    /// Only counts cancellations the mock itself sees. Inside a batch the
    /// multiplexer drops a cancelled fetch before it gets polled again, so
    /// assert on [`completed`](Self::completed) and
    /// [`in_flight`](Self::in_flight) there instead.
    pub fn cancelled(&self) -> u64 {
        self.stats.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` fetches are in flight. Returns false if that
    /// does not happen within `within`.
    pub async fn wait_for_in_flight(&self, n: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while self.in_flight() < n {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    /// Wait until no fetch is in flight. Returns false if fetches are still
    /// running after `within`.
    pub async fn wait_for_idle(&self, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while self.in_flight() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(
        &self,
        target: &str,
        scope: &CancellationToken,
        timeout: Duration,
    ) -> Result<Value, FetchError> {
        self.calls.write().await.push(target.to_string());
        let _guard = InFlightGuard::enter(&self.stats);

        let delay = match self.delays.read().await.get(target) {
            Some(delay) => *delay,
            None => *self.default_delay.read().await,
        };
        let response = self.responses.read().await.get(target).cloned();

        let mut held = self.hold.subscribe();
        let work = async move {
            let _ = held.wait_for(|held| !*held).await;
            tokio::time::sleep(delay).await;
        };

        tokio::select! {
            biased;
            _ = scope.cancelled() => {
                self.stats.cancelled.fetch_add(1, Ordering::SeqCst);
                return Err(FetchError::cancelled(target));
            }
            result = tokio::time::timeout(timeout, work) => {
                if result.is_err() {
                    return Err(FetchError::timeout(target, timeout));
                }
            }
        }

        self.stats.completed.fetch_add(1, Ordering::SeqCst);

        match response {
            Some(MockResponse::Value(value)) => Ok(value),
            Some(MockResponse::Error(kind)) => Err(FetchError::new(target, kind)),
            Some(MockResponse::Panic) => panic!("mock fetcher panicked on {}", target),
            None => Ok(json!({ "url": target })),
        }
    }
}

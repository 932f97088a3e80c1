//! Failure-counting circuit breaker.
//!
//! # State Machine
//!
//! ```text
//! Closed   --[failure_count >= max_failures]-------------> Open
//! Open     --[reset_timeout elapsed since last failure]--> HalfOpen (admits one trial)
//! HalfOpen --[trial succeeds]----------------------------> Closed (count reset)
//! HalfOpen --[trial fails, count >= max_failures]--------> Open
//! ```
//!
//! # Thread Safety
//!
//! State lives behind a single `Mutex` that is held only while admitting a
//! call or recording its outcome, never across the wrapped call. Slow
//! downstream calls therefore do not serialize unrelated callers. In
//! `HalfOpen` exactly one trial is in flight; concurrent entrants are
//! rejected with [`Rejection::HalfOpenBusy`].

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use fleetpos_core::BreakerConfig;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{BreakerError, Rejection};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through (normal operation).
    Closed,
    /// Calls are rejected without reaching the downstream.
    Open,
    /// A single trial call is probing whether the downstream recovered.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// How a call was let through. Pass it back when recording the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "record the outcome of an admitted call"]
pub enum Admission {
    /// Admitted while the circuit was closed.
    Normal,
    /// The single half-open trial call.
    Trial,
}

/// Point-in-time view of the breaker's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_at: Option<Instant>,
    pub trial_in_flight: bool,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            trial_in_flight: false,
        }
    }
}

/// Three-state failure gate around a fallible downstream call.
///
/// Construct one per protected dependency and share it through an `Arc`;
/// there is no process-wide instance.
///
/// # Example
///
/// ```
/// use fleetpos_breaker::{BreakerError, CircuitBreaker};
/// use fleetpos_core::BreakerConfig;
/// use std::time::Duration;
///
/// # async fn demo() {
/// let breaker = CircuitBreaker::new(BreakerConfig::new(3, Duration::from_secs(1)));
/// let result: Result<u32, BreakerError<std::io::Error>> =
///     breaker.execute(|| async { Ok(42) }).await;
/// assert_eq!(result.unwrap(), 42);
/// # }
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    max_failures: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            name: "breaker".to_string(),
            max_failures: config.max_failures.max(1),
            reset_timeout: config.reset_timeout(),
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    /// Name used in log lines.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` through the breaker. Every error counts as a failure.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_classified(op, |_| true).await
    }

    /// Run `op` through the breaker, counting only errors for which
    /// `is_failure` returns `true`.
    ///
    /// Errors that are not failures (e.g. "not found") are recorded as a
    /// healthy response. The operation's error is returned unchanged in
    /// [`BreakerError::Inner`] either way.
    pub async fn execute_classified<F, Fut, T, E, C>(
        &self,
        op: F,
        is_failure: C,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        let admission = self.allow_request()?;
        let guard = CallGuard {
            breaker: self,
            admission,
            settled: false,
        };

        let result = op().await;
        let failed = match &result {
            Ok(_) => false,
            Err(e) => is_failure(e),
        };
        if failed {
            guard.failure();
        } else {
            guard.success();
        }
        result.map_err(BreakerError::Inner)
    }

    /// Decide whether a call may proceed.
    ///
    /// An open circuit whose reset timeout has elapsed moves to `HalfOpen`
    /// and admits this call as the trial.
    pub fn allow_request(&self) -> Result<Admission, Rejection> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let cooled = inner
                    .last_failure_at
                    .map_or(true, |at| at.elapsed() > self.reset_timeout);
                if !cooled {
                    return Err(Rejection::Open);
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                info!(
                    breaker = %self.name,
                    failures = inner.failure_count,
                    "Circuit breaker half-open, admitting trial call"
                );
                Ok(Admission::Trial)
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(Rejection::HalfOpenBusy);
                }
                inner.trial_in_flight = true;
                debug!(breaker = %self.name, "Circuit breaker admitting trial call");
                Ok(Admission::Trial)
            }
        }
    }

    /// Record a failed call.
    ///
    /// A failure of a call admitted before the circuit opened still counts,
    /// but only the trial's outcome decides what happens in `HalfOpen`.
    pub fn record_failure(&self, admission: Admission) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());

        match (inner.state, admission) {
            (CircuitState::Closed, _) => {
                if inner.failure_count >= self.max_failures {
                    inner.state = CircuitState::Open;
                    warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        reset_timeout_ms = self.reset_timeout.as_millis() as u64,
                        "Circuit breaker OPENED"
                    );
                }
            }
            (CircuitState::HalfOpen, Admission::Trial) => {
                inner.trial_in_flight = false;
                if inner.failure_count >= self.max_failures {
                    inner.state = CircuitState::Open;
                    warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        "Circuit breaker trial failed, re-opened"
                    );
                } else {
                    debug!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        "Circuit breaker trial failed below threshold, staying half-open"
                    );
                }
            }
            _ => {}
        }
    }

    /// Record a successful call.
    ///
    /// Resets the failure count while closed, and closes the circuit when
    /// the half-open trial succeeds. Late successes of calls admitted before
    /// the circuit opened do not close it. Idempotent on a closed circuit.
    pub fn record_success(&self, admission: Admission) {
        let mut inner = self.lock();
        match (inner.state, admission) {
            (CircuitState::Closed, _) => {
                inner.failure_count = 0;
            }
            (CircuitState::HalfOpen, Admission::Trial) => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.trial_in_flight = false;
                info!(breaker = %self.name, "Circuit breaker CLOSED");
            }
            _ => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_at: inner.last_failure_at,
            trial_in_flight: inner.trial_in_flight,
        }
    }
}

/// Records the outcome of an admitted call.
///
/// A trial dropped before it finished (its future was cancelled) is
/// recorded as a failure so the half-open slot is released.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl CallGuard<'_> {
    fn success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.admission);
    }

    fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.admission);
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Trial {
            debug!(breaker = %self.breaker.name, "Circuit breaker trial abandoned");
            self.breaker.record_failure(Admission::Trial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Down,
        Missing,
    }

    fn breaker(max_failures: u32, reset_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig::new(max_failures, reset_timeout)).named("test")
    }

    async fn fail(cb: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), BreakerError<TestError>> {
        cb.execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Down)
        })
        .await
    }

    async fn succeed(cb: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), BreakerError<TestError>> {
        cb.execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
    }

    #[test]
    fn starts_closed() {
        let cb = breaker(5, Duration::from_secs(1));
        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
        assert!(snap.last_failure_at.is_none());
        assert!(!snap.trial_in_flight);
    }

    #[tokio::test]
    async fn opens_after_max_failures_and_short_circuits() {
        let cb = breaker(3, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            assert_eq!(fail(&cb, &calls).await, Err(BreakerError::Inner(TestError::Down)));
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        assert_eq!(fail(&cb, &calls).await, Err(BreakerError::Inner(TestError::Down)));
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert_eq!(succeed(&cb, &calls).await, Err(BreakerError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "open circuit must not invoke the operation");
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let _ = fail(&cb, &calls).await;
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.failure_count(), 2);
        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.failure_count(), 0);

        let _ = fail(&cb, &calls).await;
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn record_success_on_closed_is_idempotent() {
        let cb = breaker(5, Duration::from_secs(1));
        let before = cb.snapshot();
        cb.record_success(Admission::Normal);
        cb.record_success(Admission::Normal);
        assert_eq!(cb.snapshot(), before);
    }

    #[tokio::test]
    async fn half_open_trial_success_closes() {
        let cb = breaker(2, Duration::from_millis(20));
        let calls = AtomicUsize::new(0);
        let _ = fail(&cb, &calls).await;
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;
        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn half_open_trial_failure_reopens() {
        let cb = breaker(2, Duration::from_millis(20));
        let calls = AtomicUsize::new(0);
        let _ = fail(&cb, &calls).await;
        let _ = fail(&cb, &calls).await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(fail(&cb, &calls).await, Err(BreakerError::Inner(TestError::Down)));
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 3);

        // The reopened circuit starts a fresh cooldown.
        assert_eq!(succeed(&cb, &calls).await, Err(BreakerError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn half_open_admits_a_single_trial() {
        let cb = Arc::new(breaker(1, Duration::from_millis(10)));
        let calls = AtomicUsize::new(0);
        let _ = fail(&cb, &calls).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let trial_cb = cb.clone();
        let trial = tokio::spawn(async move {
            trial_cb
                .execute(|| async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, TestError>("recovered")
                })
                .await
        });

        started_rx.await.unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(succeed(&cb, &calls).await, Err(BreakerError::HalfOpenBusy));
        assert_eq!(cb.allow_request(), Err(Rejection::HalfOpenBusy));

        release_tx.send(()).unwrap();
        assert_eq!(trial.await.unwrap(), Ok("recovered"));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn abandoned_trial_releases_the_slot() {
        let cb = breaker(1, Duration::from_millis(10));
        let calls = AtomicUsize::new(0);
        let _ = fail(&cb, &calls).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cb.execute(|| std::future::pending::<Result<(), TestError>>()),
        )
        .await;
        assert!(abandoned.is_err());
        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Open);
        assert!(!snap.trial_in_flight);

        tokio::time::sleep(Duration::from_millis(30)).await;
        succeed(&cb, &calls).await.unwrap();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn classified_errors_do_not_trip() {
        let cb = breaker(2, Duration::from_secs(60));
        for _ in 0..5 {
            let result: Result<(), _> = cb
                .execute_classified(
                    || async { Err(TestError::Missing) },
                    |e| *e != TestError::Missing,
                )
                .await;
            assert_eq!(result, Err(BreakerError::Inner(TestError::Missing)));
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn stale_success_does_not_close_open_circuit() {
        let cb = breaker(1, Duration::from_secs(60));
        let admitted = cb.allow_request().unwrap();
        cb.record_failure(Admission::Normal);
        assert_eq!(cb.state(), CircuitState::Open);

        cb.record_success(admitted);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 1);
    }

    #[test]
    fn stale_failure_does_not_consume_the_trial() {
        let cb = breaker(1, Duration::ZERO);
        let stale = cb.allow_request().unwrap();
        cb.record_failure(Admission::Normal);
        std::thread::sleep(Duration::from_millis(2));

        let trial = cb.allow_request().unwrap();
        assert_eq!(trial, Admission::Trial);
        cb.record_failure(stale);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.snapshot().trial_in_flight);

        cb.record_success(trial);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn zero_max_failures_is_clamped() {
        let cb = CircuitBreaker::new(BreakerConfig {
            max_failures: 0,
            reset_timeout_ms: 10,
        });
        assert_eq!(cb.max_failures(), 1);
    }
}

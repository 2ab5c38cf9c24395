//! Circuit breaker state machine.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of a circuit breaker.
///
/// State transitions:
/// ```text
/// Closed ──(failures reach threshold)──► Open
/// Open ──(reset timeout elapses, trial admitted)──► HalfOpen
/// HalfOpen ──(trial succeeds)──► Closed
/// HalfOpen ──(trial fails)──► Open
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Calls flow through; consecutive failures are counted.
    Closed,
    /// Calls fail fast until the reset timeout elapses.
    Open,
    /// Exactly one trial call is in flight.
    HalfOpen,
}

impl BreakerState {
    /// Returns the state name as reported on the health surface.
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of a breaker, exposed on `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_failure_time: Option<DateTime<Utc>>,
}

/// Per-dependency failure tracker.
///
/// All mutation happens under one mutex, so the transition table is
/// linearizable per instance even with many in-flight calls racing on
/// the same dependency. One instance exists per logical downstream
/// dependency, not per call.
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: String,
    threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a breaker for `dependency` that opens after `threshold`
    /// consecutive failures and admits a trial call once `reset_timeout`
    /// has elapsed.
    pub fn new(dependency: impl Into<String>, threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            dependency: dependency.into(),
            threshold,
            reset_timeout,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
                last_failure_time: None,
            }),
        }
    }

    /// Returns the name of the dependency this breaker guards.
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Returns true if a call may be attempted right now.
    ///
    /// While `Open`, returns false until the reset timeout has elapsed;
    /// the first call after that moves the breaker to `HalfOpen` and is
    /// admitted as the sole trial. Further calls are rejected until the
    /// trial reports its outcome.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed() > self.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = BreakerState::HalfOpen;
                    tracing::info!(dependency = %self.dependency, "circuit breaker admitting trial call");
                    true
                } else {
                    false
                }
            }
            // Trial already in flight.
            BreakerState::HalfOpen => false,
        }
    }

    /// Records a successful call. Resets the failure count and closes
    /// the breaker.
    pub fn on_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != BreakerState::Closed {
            tracing::info!(dependency = %self.dependency, "circuit breaker closed");
        }
        inner.failure_count = 0;
        inner.state = BreakerState::Closed;
    }

    /// Records a failed call.
    ///
    /// In `Closed`, opens once consecutive failures reach the threshold.
    /// In `HalfOpen`, the failed trial re-opens the breaker and re-arms
    /// the reset timeout.
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        inner.last_failure_time = Some(Utc::now());

        let should_open = match inner.state {
            BreakerState::Closed => inner.failure_count >= self.threshold,
            BreakerState::HalfOpen => true,
            BreakerState::Open => false,
        };

        if should_open && inner.state != BreakerState::Open {
            inner.state = BreakerState::Open;
            metrics::counter!("circuit_breaker_opened_total", "dependency" => self.dependency.clone())
                .increment(1);
            tracing::warn!(
                dependency = %self.dependency,
                failure_count = inner.failure_count,
                "circuit breaker opened"
            );
        }
    }

    /// Returns a snapshot for the health surface.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().unwrap();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_time,
        }
    }
}

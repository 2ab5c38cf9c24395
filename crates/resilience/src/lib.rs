//! Failure isolation for outbound service calls.
//!
//! One [`CircuitBreaker`] instance guards one logical downstream
//! dependency. Callers ask `can_execute` before attempting the remote
//! call and report the outcome with `on_success`/`on_failure`; once
//! consecutive failures reach the threshold the breaker opens and the
//! caller fails fast instead of waiting on a dependency that is down.

pub mod breaker;

pub use breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};

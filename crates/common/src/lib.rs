//! Shared identifier types used across the coordinator's crates.

pub mod types;

pub use types::{OrderId, UserId};

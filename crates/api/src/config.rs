//! Application configuration loaded from environment variables.

use std::time::Duration;

/// How the coordinator finds its collaborator services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// In-memory directory with heartbeat eviction. Single-node mode
    /// also swaps the HTTP collaborators for in-memory doubles.
    Memory,
    /// Consul agent on each host.
    Consul,
}

/// Which bus carries domain events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMode {
    /// Synchronous dispatch inside this process.
    Memory,
    /// NATS broker.
    Nats,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT` — bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG` — tracing filter directive (default `"info"`)
/// - `DISCOVERY_MODE` — `memory` or `consul` (default `memory`)
/// - `CONSUL_URL` — Consul agent address (default `http://localhost:8500`)
/// - `BUS_MODE` — `memory` or `nats` (default `memory`)
/// - `NATS_URL` — broker address (default `nats://localhost:4222`)
/// - `CB_THRESHOLD` — breaker failure threshold (default `5`)
/// - `CB_RESET_TIMEOUT_MS` — breaker reset timeout (default `60000`)
/// - `BUS_MAX_RETRIES` — handler retries per delivery (default `3`)
/// - `REAPER_DEADLINE_SECS` — how long an order may await payment
///   before it is cancelled (default `900`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub discovery_mode: DiscoveryMode,
    pub consul_url: String,
    pub bus_mode: BusMode,
    pub nats_url: String,
    pub breaker_threshold: u32,
    pub breaker_reset_timeout: Duration,
    pub bus_max_retries: u32,
    pub reaper_deadline: Duration,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let discovery_mode = match std::env::var("DISCOVERY_MODE").as_deref() {
            Ok("consul") => DiscoveryMode::Consul,
            _ => DiscoveryMode::Memory,
        };
        let bus_mode = match std::env::var("BUS_MODE").as_deref() {
            Ok("nats") => BusMode::Nats,
            _ => BusMode::Memory,
        };

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            discovery_mode,
            consul_url: std::env::var("CONSUL_URL")
                .unwrap_or_else(|_| "http://localhost:8500".to_string()),
            bus_mode,
            nats_url: std::env::var("NATS_URL")
                .unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            breaker_threshold: env_parse("CB_THRESHOLD", 5),
            breaker_reset_timeout: Duration::from_millis(env_parse("CB_RESET_TIMEOUT_MS", 60_000)),
            bus_max_retries: env_parse("BUS_MAX_RETRIES", 3),
            reaper_deadline: Duration::from_secs(env_parse("REAPER_DEADLINE_SECS", 900)),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            discovery_mode: DiscoveryMode::Memory,
            consul_url: "http://localhost:8500".to_string(),
            bus_mode: BusMode::Memory,
            nats_url: "nats://localhost:4222".to_string(),
            breaker_threshold: 5,
            breaker_reset_timeout: Duration::from_secs(60),
            bus_max_retries: 3,
            reaper_deadline: Duration::from_secs(900),
        }
    }
}

use std::time::Duration;

use tether_shared::ConnectionConfig;

use crate::scheduler::TickStrategy;

/// Tick-loop pacing parameters.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Simulated milliseconds per tick.
    pub update_interval_ms: u64,
    /// View stagger step: each connection recomputes its view once per this
    /// many ticks.
    pub updates_per_view_update: u32,
    pub strategy: TickStrategy,
    /// Realtime catch-up cap: at most this many intervals advance per tick.
    pub max_delta_batches: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 50,
            updates_per_view_update: 5,
            strategy: TickStrategy::FixedTick,
            max_delta_batches: 1,
        }
    }
}

/// Listener and accept-path parameters.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub port: u16,
    pub listen_backlog: u32,
    /// How long an accepted socket has to present its open key.
    pub accept_timeout: Duration,
    /// Accept rate limit per one-second frame.
    pub accepts_per_second: u32,
    /// Bound on handshake survivors awaiting admission.
    pub max_create_queue: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: 12000,
            listen_backlog: 50,
            accept_timeout: Duration::from_secs(5),
            accepts_per_second: 100,
            max_create_queue: 256,
        }
    }
}

/// Aggregate server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub connection: ConnectionConfig,
    pub timing: TimingConfig,
    pub network: NetworkConfig,
}

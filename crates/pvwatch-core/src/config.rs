// ── Engine tuning ──
//
// Timing bounds and switches for the subscription engine. Never touches
// disk: the CLI (or any embedding service) builds an `EngineConfig`,
// typically from `pvwatch-config`, and hands it in.

use std::time::Duration;

/// Runtime configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Connect bound for each main-type probe channel.
    pub probe_connect_timeout: Duration,
    /// Read bound for each main-type probe.
    pub probe_read_timeout: Duration,
    /// Connect bound for the persistent main channel once a type is adopted.
    pub connect_timeout: Duration,
    /// Delay between main-channel setup and the first enrichment tier.
    pub enrichment_grace: Duration,
    /// Bound on `set_value` / `set_field_value`.
    pub put_timeout: Duration,
    /// Probe the auxiliary field catalog after subscribing.
    pub enrichment_enabled: bool,
    /// Numeric magnitudes above this are treated as "unset" sentinels.
    pub sanity_bound: f64,
    /// Buffer size of the broadcast change feed.
    pub update_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_connect_timeout: Duration::from_secs(2),
            probe_read_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_millis(500),
            enrichment_grace: Duration::from_millis(100),
            put_timeout: Duration::from_secs(5),
            enrichment_enabled: true,
            sanity_bound: 1e30,
            update_capacity: 256,
        }
    }
}

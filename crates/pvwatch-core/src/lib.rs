//! PV subscription and field-aggregation engine.
//!
//! Sits between a [`ChannelClient`](pvwatch_api::ChannelClient) and whatever
//! presents the data (the `pvwatch` CLI, or a web service):
//!
//! - **[`Engine`]**: subscribe/unsubscribe lifecycle. Probes a PV's main
//!   type in priority order, keeps a persistent monitor on the adopted type,
//!   and enriches the record from the [`catalog`] tier by tier in the
//!   background, tolerating that most fields don't exist for most PVs.
//!
//! - **[`RecordStore`]**: concurrent per-PV merge sources and published
//!   [`AggregateRecord`]s. Every change is recomputed by [`merge::recompute`]
//!   (raw fields beat bundled metadata; unset sentinels are dropped).
//!
//! - **[`SubscriptionRegistry`]**: open channel/monitor handles keyed
//!   `"PV"` / `"PV.FIELD"`.
//!
//! - **Change delivery**: a pluggable [`UpdateSink`], a broadcast feed
//!   ([`Engine::updates`]), and a snapshot [`RecordStream`].

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod model;
pub mod registry;
pub mod sink;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::CoreError;
pub use model::{
    AggregateRecord, AlarmLimits, AlarmSeverity, AlarmStatus, ConnectionState, ControlLimits,
    DisplayLimits,
};
pub use registry::{SubscriptionHandle, SubscriptionRegistry};
pub use sink::UpdateSink;
pub use store::RecordStore;
pub use stream::{RecordStream, RecordWatchStream};

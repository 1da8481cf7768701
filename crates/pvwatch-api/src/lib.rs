//! Channel-level plumbing underneath `pvwatch-core`.
//!
//! - **[`ChannelClient`]**: the primitives the engine consumes from a
//!   remote-variable client library (create, connect, get, put, monitor,
//!   close, shutdown). Async methods return `Send` futures so they can be
//!   driven from spawned tasks.
//!
//! - **Value model** ([`value`]): [`PvValue`] is a closed set of shapes
//!   (plain, timestamped, control) carrying a [`Data`] payload and,
//!   for the richer shapes, [`BundledMetadata`].
//!
//! - **[`SimClient`]**: an in-process simulated IOC implementing
//!   [`ChannelClient`], used by the CLI and by every test in the workspace.

pub mod client;
pub mod error;
pub mod sim;
pub mod value;

pub use client::{ChannelClient, ChannelHandle, Monitor, MonitorHandle};
pub use error::Error;
pub use sim::{SimClient, SimPv};
pub use value::{BundledMetadata, Data, PvValue, ValueKind};

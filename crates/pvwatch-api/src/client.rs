// ── Channel client seam ──
//
// The six primitives the engine consumes from a remote-variable client
// library. One implementation owns one process-wide communication
// context; `shutdown` closes it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::Error;
use crate::value::{Data, PvValue, ValueKind};

/// An open channel. Cheap to clone; identity is the numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    id: u64,
    name: Arc<str>,
    kind: ValueKind,
}

impl ChannelHandle {
    pub fn new(id: u64, name: &str, kind: ValueKind) -> Self {
        Self {
            id,
            name: Arc::from(name),
            kind,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

/// An installed value monitor on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorHandle {
    pub id: u64,
    pub channel_id: u64,
}

/// A freshly installed monitor and its delivery queue.
///
/// The queue yields every new value, starting with the current one, and
/// ends once the monitor or its channel is closed.
#[derive(Debug)]
pub struct Monitor {
    pub handle: MonitorHandle,
    pub updates: mpsc::UnboundedReceiver<PvValue>,
}

/// Remote-variable client primitives.
///
/// Uses RPITIT with explicit `Send` bounds so callers can drive the
/// futures from spawned tasks.
pub trait ChannelClient: Send + Sync + 'static {
    /// Create (but do not connect) a channel of the given type.
    fn create_channel(&self, name: &str, kind: ValueKind) -> Result<ChannelHandle, Error>;

    /// Wait for the channel to connect, at most `timeout`.
    fn connect(
        &self,
        channel: &ChannelHandle,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Read the current value once, at most `timeout`.
    fn get(
        &self,
        channel: &ChannelHandle,
        timeout: Duration,
    ) -> impl Future<Output = Result<PvValue, Error>> + Send;

    /// Write a value and wait for the server's acknowledgement.
    fn put(
        &self,
        channel: &ChannelHandle,
        value: Data,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Native type of the server-side value behind a connected channel,
    /// when the binding reports it. Reads still convert to the channel's
    /// requested kind.
    fn native_kind(&self, _channel: &ChannelHandle) -> Option<ValueKind> {
        None
    }

    /// Install a push monitor on a connected channel.
    fn add_monitor(&self, channel: &ChannelHandle) -> Result<Monitor, Error>;

    fn close_monitor(&self, monitor: &MonitorHandle) -> Result<(), Error>;

    /// Close a channel and any monitors still attached to it.
    fn close_channel(&self, channel: &ChannelHandle) -> Result<(), Error>;

    /// Close the communication context. Called once, after every channel
    /// has been closed.
    fn shutdown(&self) -> Result<(), Error>;
}

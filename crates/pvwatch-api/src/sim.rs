//! In-process simulated IOC.
//!
//! [`SimClient`] implements [`ChannelClient`] against a table of
//! [`SimPv`] records held in memory. It follows the same conversion and
//! timing rules a real server does closely enough to exercise every
//! engine path: typed reads that fail on impossible conversions,
//! unreachable records that only ever time out, per-field latency, and
//! read-only records that reject writes.
//!
//! ```rust,ignore
//! use pvwatch_api::sim::{SimClient, SimPv};
//!
//! let sim = SimClient::new();
//! sim.insert("SR:CURRENT", SimPv::new(12.345).with_field("EGU", "mA"));
//! sim.set("SR:CURRENT", 12.5);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::client::{ChannelClient, ChannelHandle, Monitor, MonitorHandle};
use crate::error::Error;
use crate::value::{BundledMetadata, Data, PvValue, ValueKind};

// ── SimPv ───────────────────────────────────────────────────────────

/// One simulated record: a main value plus its auxiliary fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimPv {
    pub value: Data,

    #[serde(default)]
    pub fields: BTreeMap<String, Data>,

    /// Served with the main value when present.
    #[serde(default)]
    pub metadata: Option<BundledMetadata>,

    #[serde(default)]
    pub read_only: bool,

    /// Channels to this record (and its fields) never connect.
    #[serde(default)]
    pub unreachable: bool,

    /// Connect latency for the main value and any field without an override.
    #[serde(default)]
    pub latency_ms: u64,

    #[serde(default)]
    pub field_latency_ms: BTreeMap<String, u64>,
}

impl SimPv {
    pub fn new(value: impl Into<Data>) -> Self {
        Self {
            value: value.into(),
            fields: BTreeMap::new(),
            metadata: None,
            read_only: false,
            unreachable: false,
            latency_ms: 0,
            field_latency_ms: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: &str, value: impl Into<Data>) -> Self {
        self.fields.insert(field.to_owned(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: BundledMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = latency.as_millis() as u64;
        self
    }

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn with_field_latency(mut self, field: &str, latency: Duration) -> Self {
        self.field_latency_ms
            .insert(field.to_owned(), latency.as_millis() as u64);
        self
    }
}

// ── Internal state ──────────────────────────────────────────────────

/// What a channel name points at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Main(String),
    Field { pv: String, field: String },
}

impl Target {
    fn pv(&self) -> &str {
        match self {
            Self::Main(pv) | Self::Field { pv, .. } => pv,
        }
    }
}

#[derive(Debug)]
struct ChannelState {
    handle: ChannelHandle,
    connected: bool,
}

#[derive(Debug)]
struct SimMonitor {
    channel_id: u64,
    name: String,
    kind: ValueKind,
    tx: mpsc::UnboundedSender<PvValue>,
}

#[derive(Debug, Default)]
struct SimInner {
    pvs: DashMap<String, SimPv>,
    channels: DashMap<u64, ChannelState>,
    monitors: DashMap<u64, SimMonitor>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

// ── SimClient ───────────────────────────────────────────────────────

/// Simulated client context. Cheaply cloneable; clones share state, so a
/// test can keep one clone to drive the records while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct SimClient {
    inner: Arc<SimInner>,
}

impl SimClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a simulator pre-loaded with records.
    pub fn from_pvs(pvs: impl IntoIterator<Item = (String, SimPv)>) -> Self {
        let sim = Self::new();
        for (name, pv) in pvs {
            sim.insert(&name, pv);
        }
        sim
    }

    /// Add or replace a record.
    pub fn insert(&self, name: &str, pv: SimPv) {
        self.inner.pvs.insert(name.to_owned(), pv);
        self.notify(&Target::Main(name.to_owned()));
    }

    /// Remove a record. Monitors on it (and its fields) end and its
    /// channels drop to disconnected, as when an IOC goes away.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.inner.pvs.remove(name).is_some();
        if removed {
            self.inner
                .monitors
                .retain(|_, m| self.resolve(&m.name).is_some());
            for mut entry in self.inner.channels.iter_mut() {
                if self.resolve(entry.handle.name()).is_none() {
                    entry.connected = false;
                }
            }
            tracing::debug!(pv = name, "simulated record removed");
        }
        removed
    }

    /// Update a main value (`"PV"`) or a field (`"PV.FIELD"`) from the
    /// server side and push it to every matching monitor.
    pub fn set(&self, name: &str, value: impl Into<Data>) -> bool {
        let Some(target) = self.resolve(name) else {
            return false;
        };
        {
            let Some(mut pv) = self.inner.pvs.get_mut(target.pv()) else {
                return false;
            };
            match &target {
                Target::Main(_) => pv.value = value.into(),
                Target::Field { field, .. } => {
                    pv.fields.insert(field.clone(), value.into());
                }
            }
        }
        self.notify(&target);
        true
    }

    /// Current server-side value of a main value or field.
    pub fn value(&self, name: &str) -> Option<Data> {
        let target = self.resolve(name)?;
        let pv = self.inner.pvs.get(target.pv())?;
        match &target {
            Target::Main(_) => Some(pv.value.clone()),
            Target::Field { field, .. } => pv.fields.get(field).cloned(),
        }
    }

    /// Names of every open channel, sorted.
    pub fn open_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .channels
            .iter()
            .map(|c| c.handle.name().to_owned())
            .collect();
        names.sort();
        names
    }

    pub fn open_monitor_count(&self) -> usize {
        self.inner.monitors.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_shut_down() {
            Err(Error::ContextClosed)
        } else {
            Ok(())
        }
    }

    fn resolve(&self, name: &str) -> Option<Target> {
        if self.inner.pvs.contains_key(name) {
            return Some(Target::Main(name.to_owned()));
        }
        let (pv, field) = name.rsplit_once('.')?;
        let record = self.inner.pvs.get(pv)?;
        if field == "VAL" {
            Some(Target::Main(pv.to_owned()))
        } else if record.fields.contains_key(field) {
            Some(Target::Field {
                pv: pv.to_owned(),
                field: field.to_owned(),
            })
        } else {
            None
        }
    }

    /// Connect latency, or `None` when the channel can never connect.
    fn connect_latency(&self, name: &str) -> Option<Duration> {
        let target = self.resolve(name)?;
        let pv = self.inner.pvs.get(target.pv())?;
        if pv.unreachable {
            return None;
        }
        let ms = match &target {
            Target::Main(_) => pv.latency_ms,
            Target::Field { field, .. } => pv
                .field_latency_ms
                .get(field)
                .copied()
                .unwrap_or(pv.latency_ms),
        };
        Some(Duration::from_millis(ms))
    }

    fn require_connected(&self, channel: &ChannelHandle) -> Result<(), Error> {
        let state = self
            .inner
            .channels
            .get(&channel.id())
            .ok_or(Error::UnknownHandle { id: channel.id() })?;
        if state.connected {
            Ok(())
        } else {
            Err(Error::Disconnected {
                name: channel.name().to_owned(),
            })
        }
    }

    /// Read and convert the value a channel name points at.
    fn read(&self, name: &str, kind: ValueKind) -> Result<PvValue, Error> {
        let disconnected = || Error::Disconnected {
            name: name.to_owned(),
        };
        let target = self.resolve(name).ok_or_else(disconnected)?;
        let pv = self.inner.pvs.get(target.pv()).ok_or_else(disconnected)?;
        let raw = match &target {
            Target::Main(_) => &pv.value,
            Target::Field { field, .. } => pv.fields.get(field).ok_or_else(disconnected)?,
        };
        let data = raw.convert(kind).ok_or_else(|| Error::TypeMismatch {
            name: name.to_owned(),
            kind,
        })?;

        Ok(match (&target, &pv.metadata) {
            (Target::Main(_), Some(meta)) => PvValue::Control {
                data,
                timestamp: Some(Utc::now()),
                metadata: Box::new(meta.clone()),
            },
            (Target::Main(_), None) => PvValue::Timestamped {
                data,
                timestamp: Utc::now(),
                severity: 0,
                status: 0,
            },
            (Target::Field { .. }, _) => PvValue::Plain { data },
        })
    }

    fn notify(&self, target: &Target) {
        let mut dead = Vec::new();
        for entry in self.inner.monitors.iter() {
            let monitor = entry.value();
            if self.resolve(&monitor.name).as_ref() != Some(target) {
                continue;
            }
            match self.read(&monitor.name, monitor.kind) {
                Ok(value) => {
                    if monitor.tx.send(value).is_err() {
                        dead.push(*entry.key());
                    }
                }
                Err(e) => {
                    tracing::trace!(channel = %monitor.name, error = %e, "monitor update skipped");
                }
            }
        }
        for id in dead {
            self.inner.monitors.remove(&id);
        }
    }
}

// ── ChannelClient impl ──────────────────────────────────────────────

impl ChannelClient for SimClient {
    fn create_channel(&self, name: &str, kind: ValueKind) -> Result<ChannelHandle, Error> {
        self.ensure_open()?;
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidName(name.to_owned()));
        }
        let handle = ChannelHandle::new(self.next_id(), name, kind);
        self.inner.channels.insert(
            handle.id(),
            ChannelState {
                handle: handle.clone(),
                connected: false,
            },
        );
        Ok(handle)
    }

    async fn connect(&self, channel: &ChannelHandle, timeout: Duration) -> Result<(), Error> {
        self.ensure_open()?;
        if !self.inner.channels.contains_key(&channel.id()) {
            return Err(Error::UnknownHandle { id: channel.id() });
        }

        let latency = self.connect_latency(channel.name());
        match latency {
            Some(latency) if latency <= timeout => tokio::time::sleep(latency).await,
            _ => {
                tokio::time::sleep(timeout).await;
                return Err(Error::timeout("connect", channel.name(), timeout));
            }
        }

        // The channel may have been closed while we waited.
        let mut state = self
            .inner
            .channels
            .get_mut(&channel.id())
            .ok_or(Error::UnknownHandle { id: channel.id() })?;
        state.connected = true;
        Ok(())
    }

    async fn get(&self, channel: &ChannelHandle, _timeout: Duration) -> Result<PvValue, Error> {
        self.ensure_open()?;
        self.require_connected(channel)?;
        self.read(channel.name(), channel.kind())
    }

    async fn put(&self, channel: &ChannelHandle, value: Data, _timeout: Duration) -> Result<(), Error> {
        self.ensure_open()?;
        self.require_connected(channel)?;
        let name = channel.name();
        let disconnected = || Error::Disconnected {
            name: name.to_owned(),
        };
        let target = self.resolve(name).ok_or_else(disconnected)?;
        {
            let mut pv = self
                .inner
                .pvs
                .get_mut(target.pv())
                .ok_or_else(disconnected)?;
            if pv.read_only {
                return Err(Error::WriteRejected {
                    name: name.to_owned(),
                    reason: "record is read-only".into(),
                });
            }
            let slot = match &target {
                Target::Main(_) => &mut pv.value,
                Target::Field { field, .. } => {
                    pv.fields.get_mut(field).ok_or_else(disconnected)?
                }
            };
            *slot = value
                .convert(slot.native_kind())
                .ok_or_else(|| Error::WriteRejected {
                    name: name.to_owned(),
                    reason: format!("cannot store {} value", value.type_label()),
                })?;
        }
        self.notify(&target);
        Ok(())
    }

    fn native_kind(&self, channel: &ChannelHandle) -> Option<ValueKind> {
        self.require_connected(channel).ok()?;
        let target = self.resolve(channel.name())?;
        let pv = self.inner.pvs.get(target.pv())?;
        match &target {
            Target::Main(_) => Some(pv.value.native_kind()),
            Target::Field { field, .. } => pv.fields.get(field).map(Data::native_kind),
        }
    }

    fn add_monitor(&self, channel: &ChannelHandle) -> Result<Monitor, Error> {
        self.ensure_open()?;
        self.require_connected(channel)?;
        let initial = self.read(channel.name(), channel.kind())?;

        let (tx, updates) = mpsc::unbounded_channel();
        // Receiver is alive, send cannot fail.
        let _ = tx.send(initial);

        let id = self.next_id();
        self.inner.monitors.insert(
            id,
            SimMonitor {
                channel_id: channel.id(),
                name: channel.name().to_owned(),
                kind: channel.kind(),
                tx,
            },
        );
        Ok(Monitor {
            handle: MonitorHandle {
                id,
                channel_id: channel.id(),
            },
            updates,
        })
    }

    fn close_monitor(&self, monitor: &MonitorHandle) -> Result<(), Error> {
        self.inner
            .monitors
            .remove(&monitor.id)
            .map(|_| ())
            .ok_or(Error::UnknownHandle { id: monitor.id })
    }

    fn close_channel(&self, channel: &ChannelHandle) -> Result<(), Error> {
        self.inner
            .channels
            .remove(&channel.id())
            .ok_or(Error::UnknownHandle { id: channel.id() })?;
        self.inner
            .monitors
            .retain(|_, m| m.channel_id != channel.id());
        Ok(())
    }

    fn shutdown(&self) -> Result<(), Error> {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.monitors.clear();
        self.inner.channels.clear();
        tracing::debug!("simulated context closed");
        Ok(())
    }
}

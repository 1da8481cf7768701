// ── Subscription engine ──
//
// Resolves each PV's main type by probing, holds a persistent monitor on
// it, enriches the record from the field catalog tier by tier in the
// background, and tears everything down on unsubscribe. Long-lived state
// lives in the registry and the record store; the engine itself only
// tracks one session (generation + cancellation token) per PV.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::join_all;
use pvwatch_api::{ChannelClient, ChannelHandle, Data, Monitor, PvValue, ValueKind};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::catalog::{self, Tier};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model::{AggregateRecord, ConnectionState};
use crate::registry::{SubscriptionHandle, SubscriptionRegistry, field_key};
use crate::sink::UpdateSink;
use crate::store::{PvSources, RecordStore};
use crate::stream::RecordStream;

/// Main-value channel types, in probe order.
const MAIN_PROBE_ORDER: [ValueKind; 4] = [
    ValueKind::Float64,
    ValueKind::Text,
    ValueKind::Int32,
    ValueKind::Generic,
];

/// Field channel types, in probe order.
const FIELD_PROBE_ORDER: [ValueKind; 2] = [ValueKind::Text, ValueKind::Float64];

/// One subscription of one PV name.
#[derive(Debug, Clone)]
struct Session {
    generation: u64,
    token: CancellationToken,
}

/// A resolved main channel, before registration.
struct MainChannel {
    channel: ChannelHandle,
    monitor: Monitor,
    first: PvValue,
    kind: ValueKind,
    /// Server-side type, when the client reports it.
    native: Option<ValueKind>,
}

// ── Engine ──────────────────────────────────────────────────────────

/// The PV subscription and field-aggregation engine.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Owns the client context:
/// [`shutdown`](Self::shutdown) closes every subscription and then the
/// context, once. Must be used from within a Tokio runtime.
pub struct Engine<C: ChannelClient> {
    inner: Arc<EngineInner<C>>,
}

struct EngineInner<C> {
    client: C,
    config: EngineConfig,
    registry: SubscriptionRegistry,
    store: RecordStore,
    sessions: DashMap<String, Session>,
    next_generation: AtomicU64,
    sink: Option<Arc<dyn UpdateSink>>,
    updates: broadcast::Sender<Arc<AggregateRecord>>,
    /// Parent of every session token.
    cancel: CancellationToken,
    shut_down: AtomicBool,
}

impl<C: ChannelClient> Clone for Engine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ChannelClient> Engine<C> {
    pub fn new(client: C, config: EngineConfig) -> Self {
        Self::build(client, config, None)
    }

    /// Create an engine that pushes every record change to `sink`.
    pub fn with_sink(client: C, config: EngineConfig, sink: impl UpdateSink) -> Self {
        Self::build(client, config, Some(Arc::new(sink)))
    }

    fn build(client: C, config: EngineConfig, sink: Option<Arc<dyn UpdateSink>>) -> Self {
        let (updates, _) = broadcast::channel(config.update_capacity.max(1));
        let store = RecordStore::new(config.sanity_bound);

        Self {
            inner: Arc::new(EngineInner {
                client,
                config,
                registry: SubscriptionRegistry::new(),
                store,
                sessions: DashMap::new(),
                next_generation: AtomicU64::new(0),
                sink,
                updates,
                cancel: CancellationToken::new(),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    // ── Subscribe ────────────────────────────────────────────────────

    /// Start watching a PV.
    ///
    /// Returns once the main value is connected and observed, or once every
    /// candidate type has failed; either way the outcome is the returned
    /// record (CONNECTED, or ERROR with a message). Field enrichment keeps
    /// running in the background.
    ///
    /// A PV that is already CONNECTING or CONNECTED is left alone and its
    /// current record returned. One left in any other state is torn down
    /// and subscribed afresh.
    pub async fn subscribe(&self, pv: &str) -> Result<Arc<AggregateRecord>, CoreError> {
        if self.is_shut_down() {
            return Err(CoreError::Shutdown);
        }
        let pv = pv.trim();
        if pv.is_empty() || pv.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidPvName {
                name: pv.to_owned(),
            });
        }

        if let Some(existing) = self.inner.store.get(pv) {
            if existing.connection_state.is_live() {
                return Ok(existing);
            }
            debug!(pv, state = %existing.connection_state, "restarting subscription");
            self.unsubscribe(pv);
        }

        let (session, record) = match self.inner.sessions.entry(pv.to_owned()) {
            Entry::Occupied(_) => {
                // Another caller is already setting this PV up.
                let record = self
                    .inner
                    .store
                    .get(pv)
                    .unwrap_or_else(|| Arc::new(AggregateRecord::connecting(pv)));
                return Ok(record);
            }
            Entry::Vacant(slot) => {
                let session = Session {
                    generation: self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1,
                    token: self.inner.cancel.child_token(),
                };
                let record = self.inner.store.open(pv, session.generation);
                slot.insert(session.clone());
                (session, record)
            }
        };
        info!(pv, "subscribing");
        self.notify(&record);

        let resolved = self.resolve_main(pv, &session).await;
        if session.token.is_cancelled() {
            if let Ok(main) = resolved {
                close_quietly(&self.inner.client, &main.channel, pv);
            }
            return Err(CoreError::Cancelled {
                name: pv.to_owned(),
            });
        }

        match resolved {
            Ok(main) => self.adopt_main(pv, &session, main),
            Err(failures) => {
                let message = format!("no candidate type connected: {}", failures.join("; "));
                warn!(pv, %message, "subscription failed");
                self.publish(pv, &session, |src| {
                    src.state = ConnectionState::Error;
                    src.message = Some(message);
                })
                .ok_or_else(|| CoreError::Cancelled {
                    name: pv.to_owned(),
                })
            }
        }
    }

    /// Probe each candidate type in order; the first that connects and
    /// reads, and whose persistent channel then opens, wins.
    async fn resolve_main(&self, pv: &str, session: &Session) -> Result<MainChannel, Vec<String>> {
        let mut failures = Vec::new();
        for kind in MAIN_PROBE_ORDER {
            if session.token.is_cancelled() {
                failures.push("cancelled".to_owned());
                break;
            }
            let first = match self.probe_main(pv, kind).await {
                Ok(value) => value,
                Err(e) => {
                    debug!(pv, %kind, error = %e, "type probe failed");
                    failures.push(format!("{kind}: {e}"));
                    continue;
                }
            };
            match self.open_main(pv, kind).await {
                Ok((channel, monitor)) => {
                    let native = self.inner.client.native_kind(&channel);
                    return Ok(MainChannel {
                        channel,
                        monitor,
                        first,
                        kind,
                        native,
                    });
                }
                Err(e) => {
                    debug!(pv, %kind, error = %e, "persistent channel failed after probe");
                    failures.push(format!("{kind} (persistent): {e}"));
                }
            }
        }
        Err(failures)
    }

    /// Short-lived channel: connect, read once, close.
    async fn probe_main(&self, pv: &str, kind: ValueKind) -> Result<PvValue, pvwatch_api::Error> {
        let client = &self.inner.client;
        let config = &self.inner.config;
        let channel = client.create_channel(pv, kind)?;

        let result = async {
            bounded(
                "connect",
                pv,
                config.probe_connect_timeout,
                client.connect(&channel, config.probe_connect_timeout),
            )
            .await?;
            bounded(
                "get",
                pv,
                config.probe_read_timeout,
                client.get(&channel, config.probe_read_timeout),
            )
            .await
        }
        .await;

        close_quietly(client, &channel, pv);
        result
    }

    async fn open_main(
        &self,
        pv: &str,
        kind: ValueKind,
    ) -> Result<(ChannelHandle, Monitor), pvwatch_api::Error> {
        let client = &self.inner.client;
        let limit = self.inner.config.connect_timeout;
        let channel = client.create_channel(pv, kind)?;

        let opened = bounded("connect", pv, limit, client.connect(&channel, limit))
            .await
            .and_then(|()| client.add_monitor(&channel));
        match opened {
            Ok(monitor) => Ok((channel, monitor)),
            Err(e) => {
                close_quietly(client, &channel, pv);
                Err(e)
            }
        }
    }

    fn adopt_main(
        &self,
        pv: &str,
        session: &Session,
        main: MainChannel,
    ) -> Result<Arc<AggregateRecord>, CoreError> {
        let client = &self.inner.client;
        let MainChannel {
            channel,
            monitor: Monitor { handle, updates },
            first,
            kind,
            native,
        } = main;
        let channel_id = channel.id();

        let entry = SubscriptionHandle {
            channel,
            monitor: Some(handle),
        };
        if let Some(previous) = self.inner.registry.replace(pv.to_owned(), entry) {
            debug!(pv, "main key was held by another handle");
            previous.close(client, pv);
        }

        let record = self.publish(pv, session, |src| {
            src.kind = Some(kind);
            src.observe_main(first);
            src.state = ConnectionState::Connected;
            src.message = None;
        });
        let record = match record {
            Some(record) if !session.token.is_cancelled() => record,
            _ => {
                if let Some(entry) = self.inner.registry.remove_channel(pv, channel_id) {
                    entry.close(client, pv);
                }
                return Err(CoreError::Cancelled {
                    name: pv.to_owned(),
                });
            }
        };

        self.spawn_main_forwarder(pv.to_owned(), session.clone(), updates);
        if self.inner.config.enrichment_enabled {
            let native = native.unwrap_or(kind);
            tokio::spawn(self.clone().enrich(pv.to_owned(), native, session.clone()));
        }
        info!(pv, %kind, ?native, "subscribed");
        Ok(record)
    }

    fn spawn_main_forwarder(
        &self,
        pv: String,
        session: Session,
        mut updates: mpsc::UnboundedReceiver<PvValue>,
    ) {
        let engine = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    () = session.token.cancelled() => break,

                    next = updates.recv() => {
                        let Some(value) = next else {
                            info!(pv = %pv, "main monitor closed");
                            let published = engine.publish(&pv, &session, |src| {
                                src.state = ConnectionState::Disconnected;
                                src.message = Some("main monitor closed by the client".into());
                            });
                            // A DISCONNECTED record is no longer monitored; the
                            // record itself stays readable until unsubscribe.
                            if published.is_some() {
                                session.token.cancel();
                                engine.release_keys(&pv);
                            }
                            break;
                        };
                        trace!(pv = %pv, "main update");
                        engine.publish(&pv, &session, |src| src.observe_main(value));
                    }
                }
            }
        });
    }

    // ── Enrichment ───────────────────────────────────────────────────

    /// Walk the catalog tiers. Fire-and-forget: nothing here changes the
    /// main value or connection state. `native` is the server-side type of
    /// the main value, falling back to the adopted channel type.
    async fn enrich(self, pv: String, native: ValueKind, session: Session) {
        tokio::select! {
            biased;
            () = session.token.cancelled() => return,
            () = tokio::time::sleep(self.inner.config.enrichment_grace) => {}
        }

        for tier in &catalog::TIERS {
            if session.token.is_cancelled() {
                return;
            }
            if tier.conditional && !self.looks_enumerated(&pv, native) {
                debug!(pv = %pv, tier = tier.index, "tier skipped");
                continue;
            }

            let handles = self.spawn_tier(&pv, tier, &session);
            let tier_done = async {
                let joined = join_all(handles);
                match tier.deadline {
                    Some(deadline) => tokio::time::timeout(deadline, joined).await.ok(),
                    None => Some(joined.await),
                }
            };

            tokio::select! {
                biased;

                () = session.token.cancelled() => return,

                outcome = tier_done => match outcome {
                    Some(results) => {
                        let found = results.iter().filter(|r| matches!(r, Ok(true))).count();
                        debug!(pv = %pv, tier = tier.index, tier_name = tier.name, found, "tier complete");
                    }
                    None => debug!(pv = %pv, tier = tier.index, "tier deadline reached"),
                },
            }
        }
        debug!(pv = %pv, "enrichment complete");
    }

    /// One task per field. Handles are plain `JoinHandle`s: dropping them
    /// at a tier deadline detaches the probes, which then finish under
    /// their own timeouts.
    fn spawn_tier(&self, pv: &str, tier: &Tier, session: &Session) -> Vec<JoinHandle<bool>> {
        tier.fields
            .iter()
            .map(|&field| {
                let engine = self.clone();
                let pv = pv.to_owned();
                let session = session.clone();
                let timeout = tier.field_timeout;
                tokio::spawn(async move { engine.probe_field(&pv, field, timeout, &session).await })
            })
            .collect()
    }

    /// Heuristic gate for the multi-state tier: an integer-valued record,
    /// or one that answered to the binary state names.
    fn looks_enumerated(&self, pv: &str, native: ValueKind) -> bool {
        native.is_integer()
            || self.inner.store.has_raw_field(pv, catalog::ZERO_NAME)
            || self.inner.store.has_raw_field(pv, catalog::ONE_NAME)
    }

    /// Text first, then numeric, each attempt bounded by `timeout`.
    /// Absence is the common case and is not an error.
    async fn probe_field(
        &self,
        pv: &str,
        field: &'static str,
        timeout: Duration,
        session: &Session,
    ) -> bool {
        let client = &self.inner.client;
        let key = field_key(pv, field);

        for kind in FIELD_PROBE_ORDER {
            if session.token.is_cancelled() {
                return false;
            }
            let channel = match client.create_channel(&key, kind) {
                Ok(channel) => channel,
                Err(e) => {
                    debug!(key = %key, error = %e, "field channel not created");
                    return false;
                }
            };

            let attempt = bounded("probe", &key, timeout, async {
                client.connect(&channel, timeout).await?;
                client.get(&channel, timeout).await
            })
            .await;

            match attempt {
                Ok(value) => return self.adopt_field(pv, field, &key, channel, value, session),
                Err(e) => {
                    trace!(key = %key, %kind, error = %e, "field probe failed");
                    close_quietly(client, &channel, &key);
                }
            }
        }
        false
    }

    fn adopt_field(
        &self,
        pv: &str,
        field: &'static str,
        key: &str,
        channel: ChannelHandle,
        value: PvValue,
        session: &Session,
    ) -> bool {
        let client = &self.inner.client;
        if session.token.is_cancelled() {
            trace!(key, "late probe discarded");
            close_quietly(client, &channel, key);
            return false;
        }

        let Monitor { handle, updates } = match client.add_monitor(&channel) {
            Ok(monitor) => monitor,
            Err(e) => {
                debug!(key, error = %e, "field monitor not installed");
                close_quietly(client, &channel, key);
                return false;
            }
        };
        let channel_id = channel.id();
        let entry = SubscriptionHandle {
            channel,
            monitor: Some(handle),
        };
        if let Err(entry) = self.inner.registry.insert_if_absent(key.to_owned(), entry) {
            debug!(key, "field key already registered");
            entry.close(client, key);
            return false;
        }

        let bound = self.inner.config.sanity_bound;
        let published = self.publish(pv, session, |src| {
            src.store_field(field, value.into_data(), bound);
        });

        // Registered while an unsubscribe was sweeping: undo our own entry.
        if published.is_none() || session.token.is_cancelled() {
            if let Some(entry) = self.inner.registry.remove_channel(key, channel_id) {
                entry.close(client, key);
            }
            return false;
        }

        self.spawn_field_forwarder(pv.to_owned(), field, session.clone(), updates);
        debug!(key, "field discovered");
        true
    }

    fn spawn_field_forwarder(
        &self,
        pv: String,
        field: &'static str,
        session: Session,
        mut updates: mpsc::UnboundedReceiver<PvValue>,
    ) {
        let engine = self.clone();
        tokio::spawn(async move {
            let bound = engine.inner.config.sanity_bound;
            loop {
                tokio::select! {
                    biased;

                    () = session.token.cancelled() => break,

                    next = updates.recv() => {
                        let Some(value) = next else { break };
                        trace!(pv = %pv, field, "field update");
                        engine.publish(&pv, &session, |src| {
                            src.store_field(field, value.into_data(), bound);
                        });
                    }
                }
            }
        });
    }

    // ── Unsubscribe ──────────────────────────────────────────────────

    /// Stop watching a PV and release everything associated with it.
    ///
    /// Best-effort and total: individual close failures are logged and the
    /// rest of the cleanup still runs. Safe to call repeatedly.
    pub fn unsubscribe(&self, pv: &str) {
        let pv = pv.trim();
        let session = self.inner.sessions.get(pv).map(|s| s.value().clone());
        if let Some(session) = &session {
            session.token.cancel();
        }

        self.release_keys(pv);

        let Some(session) = session else {
            debug!(pv, "not subscribed");
            return;
        };
        if let Some(record) = self.inner.store.apply(pv, session.generation, |src| {
            src.state = ConnectionState::Disconnected;
            src.message = None;
        }) {
            self.notify(&record);
        }
        self.inner.store.evict(pv, session.generation);
        self.inner
            .sessions
            .remove_if(pv, |_, s| s.generation == session.generation);
        info!(pv, "unsubscribed");
    }

    /// Close the main key, every catalog key, then anything else under
    /// `"PV."` that a late probe registered.
    fn release_keys(&self, pv: &str) {
        self.close_key(pv);
        for field in catalog::all_fields() {
            self.close_owned_key(pv, &field_key(pv, field));
        }
        for key in self.inner.registry.keys_with_prefix(&format!("{pv}.")) {
            if self.close_owned_key(pv, &key) {
                debug!(key = %key, "swept registration");
            }
        }
    }

    fn close_key(&self, key: &str) -> bool {
        self.inner
            .registry
            .remove(key)
            .map(|entry| entry.close(&self.inner.client, key))
            .is_some()
    }

    /// Close `key` on behalf of `pv` unless another subscribed PV owns it
    /// (`"A.B"` is both a field key of `A` and a PV name in its own right).
    fn close_owned_key(&self, pv: &str, key: &str) -> bool {
        let foreign = self.inner.sessions.iter().any(|s| {
            let name = s.key().as_str();
            name != pv
                && (key == name
                    || key
                        .strip_prefix(name)
                        .is_some_and(|rest| rest.starts_with('.')))
        });
        !foreign && self.close_key(key)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Write the main value of a subscribed PV.
    pub async fn set_value(&self, pv: &str, value: Data) -> Result<(), CoreError> {
        self.put_key(pv.trim(), value).await
    }

    /// Write one auxiliary field of a subscribed PV. The field must have
    /// been discovered; `VAL` addresses the main value.
    pub async fn set_field_value(&self, pv: &str, field: &str, value: Data) -> Result<(), CoreError> {
        let field = field.trim();
        if field == "VAL" {
            return self.put_key(pv.trim(), value).await;
        }
        self.put_key(&field_key(pv.trim(), field), value).await
    }

    async fn put_key(&self, key: &str, value: Data) -> Result<(), CoreError> {
        if self.is_shut_down() {
            return Err(CoreError::Shutdown);
        }
        let entry = self
            .inner
            .registry
            .get(key)
            .ok_or_else(|| CoreError::NotSubscribed {
                key: key.to_owned(),
            })?;

        let payload = put_payload(value);
        let limit = self.inner.config.put_timeout;
        debug!(key, kind = payload.type_label(), "writing");
        bounded(
            "put",
            key,
            limit,
            self.inner.client.put(&entry.channel, payload, limit),
        )
        .await
        .map_err(|e| {
            warn!(key, error = %e, "write failed");
            CoreError::from(e)
        })
    }

    // ── Read accessors ───────────────────────────────────────────────

    pub fn get_record(&self, pv: &str) -> Option<Arc<AggregateRecord>> {
        self.inner.store.get(pv)
    }

    /// Latest raw value of one field; `VAL` is the main value.
    pub fn get_field(&self, pv: &str, field: &str) -> Option<Data> {
        let record = self.inner.store.get(pv)?;
        if field == "VAL" {
            record.value.clone()
        } else {
            record.raw_fields.get(field).cloned()
        }
    }

    /// Every discovered raw field of a PV, or `None` if it isn't subscribed.
    pub fn get_all_fields(&self, pv: &str) -> Option<BTreeMap<String, Data>> {
        self.inner.store.get(pv).map(|r| r.raw_fields.clone())
    }

    /// Names of every subscribed PV, sorted.
    pub fn subscribed(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.sessions.iter().map(|s| s.key().clone()).collect();
        names.sort();
        names
    }

    /// Registry keys currently held for a PV (`"PV"` and `"PV.*"`).
    pub fn registry_keys(&self, pv: &str) -> Vec<String> {
        let prefix = format!("{pv}.");
        let mut keys = self.inner.registry.keys_with_prefix(&prefix);
        if self.inner.registry.contains(pv) {
            keys.insert(0, pv.to_owned());
        }
        keys
    }

    /// Snapshot view of every record, with change notification.
    pub fn records(&self) -> RecordStream {
        RecordStream::new(self.inner.store.subscribe())
    }

    /// Feed of every changed record. Slow receivers observe `Lagged`.
    pub fn updates(&self) -> broadcast::Receiver<Arc<AggregateRecord>> {
        self.inner.updates.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Unsubscribe everything, stop background tasks, and close the client
    /// context. Subsequent calls are no-ops.
    pub fn shutdown(&self) -> Result<(), CoreError> {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for pv in self.subscribed() {
            self.unsubscribe(&pv);
        }
        for key in self.inner.registry.keys() {
            self.close_key(&key);
        }
        self.inner.cancel.cancel();
        self.inner.client.shutdown()?;
        info!("engine shut down");
        Ok(())
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Apply a change to the PV's sources under `session`, then notify.
    fn publish(
        &self,
        pv: &str,
        session: &Session,
        f: impl FnOnce(&mut PvSources),
    ) -> Option<Arc<AggregateRecord>> {
        let record = self.inner.store.apply(pv, session.generation, f)?;
        self.notify(&record);
        Some(record)
    }

    fn notify(&self, record: &Arc<AggregateRecord>) {
        if let Some(sink) = &self.inner.sink {
            sink.record_changed(record);
        }
        // No receivers is fine.
        let _ = self.inner.updates.send(Arc::clone(record));
    }
}

/// Run a client call under `limit`, mapping expiry to a client timeout.
async fn bounded<T: Send>(
    operation: &'static str,
    name: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T, pvwatch_api::Error>> + Send,
) -> Result<T, pvwatch_api::Error> {
    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        Err(pvwatch_api::Error::Timeout {
            operation,
            name: name.to_owned(),
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        })
    })
}

fn close_quietly<C: ChannelClient>(client: &C, channel: &ChannelHandle, key: &str) {
    if let Err(e) = client.close_channel(channel) {
        debug!(key, error = %e, "failed to close probe channel");
    }
}

/// Numbers (scalar or array) go out on the float path, text on the text
/// path.
fn put_payload(value: Data) -> Data {
    match value {
        Data::Int(i) => Data::Float(f64::from(i)),
        Data::IntArray(v) => Data::FloatArray(v.into_iter().map(f64::from).collect()),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn integers_take_the_float_path() {
        assert_eq!(put_payload(Data::Int(3)), Data::Float(3.0));
        assert_eq!(put_payload(Data::from("x")), Data::from("x"));
        assert_eq!(put_payload(Data::IntArray(vec![1, 2])), Data::FloatArray(vec![1.0, 2.0]));
        assert_eq!(
            put_payload(Data::TextArray(vec!["a".into()])),
            Data::TextArray(vec!["a".into()])
        );
    }

    #[test]
    fn probe_orders() {
        assert_eq!(MAIN_PROBE_ORDER[0], ValueKind::Float64);
        assert_eq!(MAIN_PROBE_ORDER[3], ValueKind::Generic);
        assert_eq!(FIELD_PROBE_ORDER, [ValueKind::Text, ValueKind::Float64]);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_maps_expiry_to_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<(), pvwatch_api::Error>(())
        };
        let err = bounded("get", "A", Duration::from_millis(200), slow)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "get on A timed out after 200ms");
    }
}

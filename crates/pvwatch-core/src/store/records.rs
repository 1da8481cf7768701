// ── Reactive record store ──
//
// Concurrent storage of aggregate records and their merge sources, with
// push-based change notification via `watch` channels.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;

use super::sources::PvSources;
use crate::merge;
use crate::model::AggregateRecord;

type Snapshot = Arc<Vec<Arc<AggregateRecord>>>;

/// One aggregate record per watched PV.
///
/// Every change goes through [`apply`](Self::apply): the closure mutates the
/// PV's sources and the record is recomputed and published while the
/// sources entry is still locked, so concurrent triggers for the same PV
/// never publish out of order. The snapshot handed to watchers is rebuilt
/// on each mutation, sorted by name.
pub struct RecordStore {
    records: DashMap<String, Arc<AggregateRecord>>,
    sources: DashMap<String, PvSources>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    snapshot: watch::Sender<Snapshot>,

    sanity_bound: f64,
}

impl RecordStore {
    pub fn new(sanity_bound: f64) -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            records: DashMap::new(),
            sources: DashMap::new(),
            version,
            snapshot,
            sanity_bound,
        }
    }

    /// Start tracking a PV with fresh sources and publish its CONNECTING
    /// record. Any previous state under the name is replaced.
    pub fn open(&self, name: &str, generation: u64) -> Arc<AggregateRecord> {
        let src = self
            .sources
            .entry(name.to_owned())
            .insert(PvSources::new(generation));
        self.publish(name, &src)
    }

    /// Mutate a PV's sources and publish the recomputed record.
    ///
    /// Returns `None` (and does nothing) when the PV isn't tracked or is
    /// tracked under a different generation.
    pub fn apply(
        &self,
        name: &str,
        generation: u64,
        f: impl FnOnce(&mut PvSources),
    ) -> Option<Arc<AggregateRecord>> {
        let mut src = self.sources.get_mut(name)?;
        if src.generation != generation {
            return None;
        }
        f(&mut src);
        Some(self.publish(name, &src))
    }

    /// Stop tracking a PV. Returns the last published record.
    pub fn evict(&self, name: &str, generation: u64) -> Option<Arc<AggregateRecord>> {
        self.sources
            .remove_if(name, |_, src| src.generation == generation)?;
        let removed = self.records.remove(name).map(|(_, r)| r);
        self.rebuild_snapshot();
        self.bump_version();
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<AggregateRecord>> {
        self.records.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Generation a PV is currently tracked under.
    pub fn generation(&self, name: &str) -> Option<u64> {
        self.sources.get(name).map(|s| s.generation)
    }

    /// Whether a raw field has been discovered for the PV.
    pub fn has_raw_field(&self, name: &str, field: &str) -> bool {
        self.sources
            .get(name)
            .is_some_and(|s| s.raw_fields.contains_key(field))
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self, name: &str, src: &PvSources) -> Arc<AggregateRecord> {
        let record = Arc::new(merge::recompute(name, src, self.sanity_bound, Utc::now()));
        self.records.insert(name.to_owned(), Arc::clone(&record));
        self.rebuild_snapshot();
        self.bump_version();
        record
    }

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<AggregateRecord>> =
            self.records.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.name.cmp(&b.name));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

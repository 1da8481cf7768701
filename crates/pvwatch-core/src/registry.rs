// ── Subscription registry ──
//
// Concurrent keyed store of open channel/monitor handles. Keys are `"PV"`
// for a main value and `"PV.FIELD"` for an auxiliary field; one handle per
// key, never shared.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pvwatch_api::{ChannelClient, ChannelHandle, MonitorHandle};
use tracing::warn;

/// One channel and, once connected, its monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub channel: ChannelHandle,
    pub monitor: Option<MonitorHandle>,
}

impl SubscriptionHandle {
    /// Close the monitor, then the channel. Failures are logged and the
    /// remaining step still runs.
    pub fn close<C: ChannelClient>(&self, client: &C, key: &str) {
        if let Some(monitor) = &self.monitor {
            if let Err(e) = client.close_monitor(monitor) {
                warn!(key, error = %e, "failed to close monitor (non-fatal)");
            }
        }
        if let Err(e) = client.close_channel(&self.channel) {
            warn!(key, error = %e, "failed to close channel (non-fatal)");
        }
    }
}

/// Registry key for a field of a PV.
pub fn field_key(pv: &str, field: &str) -> String {
    format!("{pv}.{field}")
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: DashMap<String, SubscriptionHandle>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle unless the key is taken. On conflict the handle
    /// is given back so the caller can close it.
    pub fn insert_if_absent(
        &self,
        key: String,
        handle: SubscriptionHandle,
    ) -> Result<(), SubscriptionHandle> {
        match self.entries.entry(key) {
            Entry::Occupied(_) => Err(handle),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Register a handle, returning whatever held the key before.
    pub fn replace(&self, key: String, handle: SubscriptionHandle) -> Option<SubscriptionHandle> {
        self.entries.insert(key, handle)
    }

    pub fn get(&self, key: &str) -> Option<SubscriptionHandle> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<SubscriptionHandle> {
        self.entries.remove(key).map(|(_, h)| h)
    }

    /// Remove the entry only if it still holds the given channel.
    pub fn remove_channel(&self, key: &str, channel_id: u64) -> Option<SubscriptionHandle> {
        self.entries
            .remove_if(key, |_, h| h.channel.id() == channel_id)
            .map(|(_, h)| h)
    }

    /// Keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|r| r.key().starts_with(prefix))
            .map(|r| r.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.keys_with_prefix("")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pvwatch_api::ValueKind;

    use super::*;

    fn handle(id: u64, name: &str) -> SubscriptionHandle {
        SubscriptionHandle {
            channel: ChannelHandle::new(id, name, ValueKind::Text),
            monitor: None,
        }
    }

    #[test]
    fn insert_if_absent_returns_handle_on_conflict() {
        let reg = SubscriptionRegistry::new();
        assert!(reg.insert_if_absent("A.DESC".into(), handle(1, "A.DESC")).is_ok());

        let rejected = reg
            .insert_if_absent("A.DESC".into(), handle(2, "A.DESC"))
            .unwrap_err();
        assert_eq!(rejected.channel.id(), 2);
        assert_eq!(reg.get("A.DESC").unwrap().channel.id(), 1);
    }

    #[test]
    fn remove_channel_checks_identity() {
        let reg = SubscriptionRegistry::new();
        reg.insert_if_absent("A.EGU".into(), handle(1, "A.EGU")).unwrap();

        assert!(reg.remove_channel("A.EGU", 9).is_none());
        assert!(reg.contains("A.EGU"));
        assert!(reg.remove_channel("A.EGU", 1).is_some());
        assert!(reg.is_empty());
    }

    #[test]
    fn prefix_listing_is_sorted() {
        let reg = SubscriptionRegistry::new();
        for (id, key) in [(1, "A"), (2, "A.EGU"), (3, "A.DESC"), (4, "AB.DESC")] {
            reg.insert_if_absent(key.into(), handle(id, key)).unwrap();
        }
        assert_eq!(reg.keys_with_prefix("A."), vec!["A.DESC", "A.EGU"]);
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.keys().first().map(String::as_str), Some("A"));
    }

    #[test]
    fn field_keys() {
        assert_eq!(field_key("SR:CURRENT", "EGU"), "SR:CURRENT.EGU");
    }
}

// ── Update sink ──
//
// Push callback invoked on every record change. The presentation layer
// plugs in here; closures work directly.

use crate::model::AggregateRecord;

/// Receives every published record: once per merge, and once more with
/// the DISCONNECTED record at unsubscribe.
///
/// Called synchronously from engine tasks, so implementations should hand
/// off rather than block.
pub trait UpdateSink: Send + Sync + 'static {
    fn record_changed(&self, record: &AggregateRecord);
}

impl<F> UpdateSink for F
where
    F: Fn(&AggregateRecord) + Send + Sync + 'static,
{
    fn record_changed(&self, record: &AggregateRecord) {
        self(record);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: Box<dyn UpdateSink> = {
            let seen = Arc::clone(&seen);
            Box::new(move |r: &AggregateRecord| seen.lock().unwrap().push(r.name.clone()))
        };
        sink.record_changed(&AggregateRecord::connecting("A"));
        assert_eq!(*seen.lock().unwrap(), vec!["A".to_owned()]);
    }
}

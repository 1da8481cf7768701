// ── Reactive record streams ──
//
// Subscription types for consuming record changes from the engine.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::AggregateRecord;

type Snapshot = Arc<Vec<Arc<AggregateRecord>>>;

/// A subscription to the full set of aggregate records.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via the `changed()` method or by converting to a `Stream`.
pub struct RecordStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl RecordStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Look up one PV in the latest snapshot.
    pub fn find(&self, name: &str) -> Option<Arc<AggregateRecord>> {
        self.receiver
            .borrow()
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the engine has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> RecordWatchStream {
        RecordWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current snapshot first, then a new one each time the
/// store is mutated.
pub struct RecordWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for RecordWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

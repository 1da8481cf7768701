// ── Aggregate record store ──
//
// Per-PV merge sources plus the published records, with push-based
// change notification.

mod records;
mod sources;

pub use records::RecordStore;
pub use sources::{MainSample, PvSources};

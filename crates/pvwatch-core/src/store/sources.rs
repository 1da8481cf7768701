// ── Merge sources ──
//
// What the engine has observed about one PV: the latest main value and
// the raw auxiliary fields. Owned by the `RecordStore` and only touched
// under its entry lock.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pvwatch_api::{Data, PvValue, ValueKind};

use crate::catalog;
use crate::merge::sanitize;
use crate::model::ConnectionState;

/// The latest main-channel delivery and when it was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct MainSample {
    pub value: PvValue,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PvSources {
    /// Subscription this state belongs to. Late writers from an earlier
    /// subscription of the same name carry a stale generation.
    pub generation: u64,
    /// Channel type adopted for the main value.
    pub kind: Option<ValueKind>,
    pub main: Option<MainSample>,
    pub raw_fields: BTreeMap<String, Data>,
    pub state: ConnectionState,
    pub message: Option<String>,
}

impl PvSources {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            kind: None,
            main: None,
            raw_fields: BTreeMap::new(),
            state: ConnectionState::Connecting,
            message: None,
        }
    }

    pub fn observe_main(&mut self, value: PvValue) {
        self.main = Some(MainSample {
            value,
            observed_at: Utc::now(),
        });
    }

    /// Store a field's latest raw value. Numbers that are non-finite or
    /// beyond `bound` are unset sentinels, as is anything in a numeric
    /// field that doesn't read as a number; those leave the field absent.
    /// Returns whether the field is now present.
    pub fn store_field(&mut self, field: &str, raw: Data, bound: f64) -> bool {
        let insane = match &raw {
            Data::Float(f) => sanitize(*f, bound).is_none(),
            _ if catalog::is_numeric_field(field) => {
                raw.as_f64().and_then(|v| sanitize(v, bound)).is_none()
            }
            _ => false,
        };
        if insane {
            self.raw_fields.remove(field);
            false
        } else {
            self.raw_fields.insert(field.to_owned(), raw);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUND: f64 = 1e30;

    #[test]
    fn numeric_fields_drop_sentinels() {
        let mut src = PvSources::new(1);
        assert!(src.store_field("HOPR", "500".into(), BOUND));
        assert!(!src.store_field("HOPR", "1e31".into(), BOUND));
        assert!(!src.raw_fields.contains_key("HOPR"));

        assert!(!src.store_field("LOPR", Data::Float(f64::NAN), BOUND));
        assert!(!src.store_field("PREC", "n/a".into(), BOUND));
    }

    #[test]
    fn text_fields_are_kept_verbatim() {
        let mut src = PvSources::new(1);
        assert!(src.store_field("DESC", "1e40".into(), BOUND));
        assert_eq!(src.raw_fields.get("DESC"), Some(&Data::from("1e40")));
    }

    #[test]
    fn non_finite_float_is_dropped_anywhere() {
        let mut src = PvSources::new(1);
        src.store_field("ZNAM", "Off".into(), BOUND);
        assert!(!src.store_field("ZNAM", Data::Float(f64::INFINITY), BOUND));
        assert!(src.raw_fields.is_empty());
    }
}

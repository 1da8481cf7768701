// ── Auxiliary field catalog ──
//
// Static, ordered list of the record fields probed after a PV's main
// channel is up. Tiers run in sequence; fields within a tier are probed
// in parallel, each under the tier's per-field timeout.

use std::time::Duration;

/// One priority tier of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub index: u8,
    pub name: &'static str,
    pub fields: &'static [&'static str],
    /// Bound on one connect+read attempt for a single field.
    pub field_timeout: Duration,
    /// Bound on the whole tier join. `None` waits for every probe.
    pub deadline: Option<Duration>,
    /// Entered only when the PV looks enumerated.
    pub conditional: bool,
}

pub const SEVERITY: &str = "SEVR";
pub const STATUS: &str = "STAT";
pub const DESCRIPTION: &str = "DESC";
pub const UNITS: &str = "EGU";
pub const PRECISION: &str = "PREC";
pub const DISPLAY_HIGH: &str = "HOPR";
pub const DISPLAY_LOW: &str = "LOPR";
pub const ALARM_HIHI: &str = "HIHI";
pub const ALARM_HIGH: &str = "HIGH";
pub const ALARM_LOW: &str = "LOW";
pub const ALARM_LOLO: &str = "LOLO";
pub const DRIVE_HIGH: &str = "DRVH";
pub const DRIVE_LOW: &str = "DRVL";
pub const ZERO_NAME: &str = "ZNAM";
pub const ONE_NAME: &str = "ONAM";

/// Per-limit / per-state alarm severity fields.
pub const SEVERITY_FIELDS: [&str; 6] = ["HHSV", "HSV", "LSV", "LLSV", "ZSV", "OSV"];

/// Multi-state label fields; the index is the state ordinal.
pub const STATE_NAME_FIELDS: [&str; 16] = [
    "ZRST", "ONST", "TWST", "THST", "FRST", "FVST", "SXST", "SVST", "EIST", "NIST", "TEST", "ELST",
    "TVST", "TTST", "FTST", "FFST",
];

/// Fields whose value is a number even when read as text.
const NUMERIC_FIELDS: [&str; 9] = [
    PRECISION,
    DISPLAY_HIGH,
    DISPLAY_LOW,
    ALARM_HIHI,
    ALARM_HIGH,
    ALARM_LOW,
    ALARM_LOLO,
    DRIVE_HIGH,
    DRIVE_LOW,
];

pub const TIERS: [Tier; 4] = [
    Tier {
        index: 0,
        name: "critical alarm",
        fields: &[SEVERITY, STATUS],
        field_timeout: Duration::from_millis(500),
        deadline: None,
        conditional: false,
    },
    Tier {
        index: 1,
        name: "essential metadata",
        fields: &[
            DESCRIPTION,
            UNITS,
            PRECISION,
            DISPLAY_HIGH,
            DISPLAY_LOW,
            ALARM_HIHI,
            ALARM_HIGH,
            ALARM_LOW,
            ALARM_LOLO,
        ],
        field_timeout: Duration::from_secs(1),
        deadline: Some(Duration::from_secs(2)),
        conditional: false,
    },
    Tier {
        index: 2,
        name: "secondary metadata",
        fields: &[
            "HHSV", "HSV", "LSV", "LLSV", "ZSV", "OSV", ZERO_NAME, ONE_NAME, DRIVE_HIGH, DRIVE_LOW,
        ],
        field_timeout: Duration::from_millis(500),
        deadline: Some(Duration::from_secs(1)),
        conditional: false,
    },
    Tier {
        index: 3,
        name: "state names",
        fields: &STATE_NAME_FIELDS,
        field_timeout: Duration::from_millis(200),
        deadline: None,
        conditional: true,
    },
];

/// Every catalog field, tier order.
pub fn all_fields() -> impl Iterator<Item = &'static str> {
    TIERS.iter().flat_map(|t| t.fields.iter().copied())
}

pub fn is_catalog_field(field: &str) -> bool {
    all_fields().any(|f| f == field)
}

/// Fields that only make sense as numbers; see `store::PvSources`.
pub fn is_numeric_field(field: &str) -> bool {
    NUMERIC_FIELDS.contains(&field)
}

/// Ordinal of a multi-state label field (`ZRST` → 0, `FFST` → 15).
pub fn state_ordinal(field: &str) -> Option<u16> {
    STATE_NAME_FIELDS
        .iter()
        .position(|f| *f == field)
        .and_then(|i| u16::try_from(i).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_deadlines_cover_both_probe_attempts() {
        for tier in &TIERS {
            if let Some(deadline) = tier.deadline {
                assert!(deadline >= tier.field_timeout * 2, "tier {}", tier.index);
            }
        }
    }

    #[test]
    fn catalog_has_no_duplicates() {
        let mut fields: Vec<_> = all_fields().collect();
        let total = fields.len();
        fields.sort_unstable();
        fields.dedup();
        assert_eq!(fields.len(), total);
        assert_eq!(total, 2 + 9 + 10 + 16);
    }

    #[test]
    fn only_last_tier_is_conditional() {
        assert_eq!(
            TIERS.iter().filter(|t| t.conditional).map(|t| t.index).collect::<Vec<_>>(),
            vec![3]
        );
    }

    #[test]
    fn state_ordinals() {
        assert_eq!(state_ordinal("ZRST"), Some(0));
        assert_eq!(state_ordinal("FFST"), Some(15));
        assert_eq!(state_ordinal("ZNAM"), None);
        assert!(is_catalog_field("HHSV"));
        assert!(!is_catalog_field("VAL"));
        assert!(is_numeric_field("HOPR"));
        assert!(!is_numeric_field("DESC"));
    }
}

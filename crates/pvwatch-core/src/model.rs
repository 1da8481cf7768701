// ── Aggregate record model ──
//
// The consumer-facing snapshot of one PV plus the alarm taxonomy it is
// expressed in. Records are rebuilt wholesale by `merge::recompute` and
// never mutated in place once published.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pvwatch_api::Data;
use serde::{Deserialize, Serialize};

// ── ConnectionState ─────────────────────────────────────────────────

/// Lifecycle of a PV's main channel.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Error,
    Timeout,
}

impl ConnectionState {
    /// Being established or actively monitored. A fresh `subscribe` leaves
    /// live records alone and restarts everything else.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

// ── Alarm taxonomy ──────────────────────────────────────────────────

/// Alarm severity, in code order.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AlarmSeverity {
    #[default]
    NoAlarm,
    Minor,
    Major,
    Invalid,
}

impl AlarmSeverity {
    pub const ALL: [Self; 4] = [Self::NoAlarm, Self::Minor, Self::Major, Self::Invalid];

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Interpret a raw field value: a numeric code (`2`, `2.0`, `"2"`) or a
    /// name (`"MAJOR"`, `"major_alarm"`).
    pub fn from_raw(raw: &Data) -> Option<Self> {
        parse_coded(raw, &Self::ALL)
    }
}

/// Alarm status (cause), in code order.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AlarmStatus {
    #[default]
    NoAlarm,
    Read,
    Write,
    Hihi,
    High,
    Lolo,
    Low,
    State,
    Cos,
    Comm,
    Timeout,
    HwLimit,
    Calc,
    Scan,
    Link,
    Soft,
    BadSub,
    Udf,
    Disable,
    Simm,
    ReadAccess,
    WriteAccess,
}

impl AlarmStatus {
    pub const ALL: [Self; 22] = [
        Self::NoAlarm,
        Self::Read,
        Self::Write,
        Self::Hihi,
        Self::High,
        Self::Lolo,
        Self::Low,
        Self::State,
        Self::Cos,
        Self::Comm,
        Self::Timeout,
        Self::HwLimit,
        Self::Calc,
        Self::Scan,
        Self::Link,
        Self::Soft,
        Self::BadSub,
        Self::Udf,
        Self::Disable,
        Self::Simm,
        Self::ReadAccess,
        Self::WriteAccess,
    ];

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub fn from_raw(raw: &Data) -> Option<Self> {
        parse_coded(raw, &Self::ALL)
    }
}

/// Shared parser for code-ordered enums.
fn parse_coded<T: Copy + FromStr>(raw: &Data, all: &[T]) -> Option<T> {
    let by_code = |f: f64| code_index(f).and_then(|i| all.get(i)).copied();
    match raw {
        Data::Int(i) => usize::try_from(*i).ok().and_then(|i| all.get(i)).copied(),
        Data::Float(f) => by_code(*f),
        Data::Text(s) => {
            let s = s.trim();
            if let Ok(f) = s.parse::<f64>() {
                return by_code(f);
            }
            s.parse().ok().or_else(|| {
                s.to_ascii_uppercase()
                    .strip_suffix("_ALARM")
                    .and_then(|s| s.parse().ok())
            })
        }
        _ => None,
    }
}

#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn code_index(f: f64) -> Option<usize> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < 256.0).then_some(f as usize)
}

// ── Limits ──────────────────────────────────────────────────────────

/// Operator display range (`LOPR`/`HOPR`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayLimits {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

/// Alarm thresholds (`LOLO`/`LOW`/`HIGH`/`HIHI`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmLimits {
    pub lolo: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub hihi: Option<f64>,
}

/// Drive range (`DRVL`/`DRVH`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl DisplayLimits {
    pub fn is_empty(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }
}

impl AlarmLimits {
    pub fn is_empty(&self) -> bool {
        self.lolo.is_none() && self.low.is_none() && self.high.is_none() && self.hihi.is_none()
    }
}

impl ControlLimits {
    pub fn is_empty(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }
}

// ── AggregateRecord ─────────────────────────────────────────────────

/// Everything known about one watched PV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub name: String,
    pub value: Option<Data>,
    /// Descriptive label of `value`, e.g. `"float64"` or `"string[]"`.
    pub value_type: Option<String>,
    pub connection_state: ConnectionState,
    pub alarm_severity: AlarmSeverity,
    pub alarm_status: AlarmStatus,
    pub units: Option<String>,
    pub precision: Option<i16>,
    pub description: Option<String>,
    pub display_limits: Option<DisplayLimits>,
    pub alarm_limits: Option<AlarmLimits>,
    pub control_limits: Option<ControlLimits>,
    /// Severity assigned to each limit or binary state, keyed by the
    /// field that carries it (`HHSV`, `ZSV`, ...).
    pub alarm_severities: BTreeMap<String, AlarmSeverity>,
    /// Latest raw value of every discovered auxiliary field.
    pub raw_fields: BTreeMap<String, Data>,
    /// Enumerated state labels by ordinal.
    pub state_names: BTreeMap<u16, String>,
    pub element_count: Option<usize>,
    /// Failure or status detail, set on ERROR and DISCONNECTED.
    pub message: Option<String>,
    /// Origin timestamp of `value`, or observation time when the origin
    /// supplies none.
    pub value_timestamp: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
}

impl AggregateRecord {
    /// A fresh record for a PV whose subscription has just started.
    pub fn connecting(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            value: None,
            value_type: None,
            connection_state: ConnectionState::Connecting,
            alarm_severity: AlarmSeverity::NoAlarm,
            alarm_status: AlarmStatus::NoAlarm,
            units: None,
            precision: None,
            description: None,
            display_limits: None,
            alarm_limits: None,
            control_limits: None,
            alarm_severities: BTreeMap::new(),
            raw_fields: BTreeMap::new(),
            state_names: BTreeMap::new(),
            element_count: None,
            message: None,
            value_timestamp: None,
            last_update: Utc::now(),
        }
    }

    pub fn is_enumerated(&self) -> bool {
        !self.state_names.is_empty()
    }

    pub fn state_name(&self, ordinal: u16) -> Option<&str> {
        self.state_names.get(&ordinal).map(String::as_str)
    }

    /// Label of the current value, for enumerated PVs.
    pub fn state_label(&self) -> Option<&str> {
        let ordinal = self.value.as_ref()?.as_f64().and_then(code_index)?;
        self.state_name(u16::try_from(ordinal).ok()?)
    }
}

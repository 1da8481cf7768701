// ── Channel value model ──
//
// A small closed set of tagged variants returned directly by the client
// binding. Consumers match on the variant instead of probing wrapper
// objects at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── ValueKind ───────────────────────────────────────────────────────

/// The type a channel is opened with.
///
/// The server converts its native value to this type on every read and
/// monitor delivery; a conversion it cannot perform fails the read.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Float64,
    #[strum(serialize = "string")]
    #[serde(rename = "string")]
    Text,
    Int32,
    /// Native type, no conversion requested.
    Generic,
}

impl ValueKind {
    /// Integer kinds hint at enumerated records.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int32)
    }
}

// ── Data ────────────────────────────────────────────────────────────

/// A scalar or array payload.
///
/// Untagged so that `2`, `2.5`, `"text"` and `[1, 2]` map naturally from
/// JSON and TOML. Integer variants come first so whole numbers stay integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data {
    Int(i32),
    Float(f64),
    Text(String),
    IntArray(Vec<i32>),
    FloatArray(Vec<f64>),
    TextArray(Vec<String>),
}

impl Data {
    /// Descriptive type label, e.g. `"float64"` or `"string[]"`.
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Int(_) => "int32",
            Self::Float(_) => "float64",
            Self::Text(_) => "string",
            Self::IntArray(_) => "int32[]",
            Self::FloatArray(_) => "float64[]",
            Self::TextArray(_) => "string[]",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Self::IntArray(_) | Self::FloatArray(_) | Self::TextArray(_)
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int(_) | Self::Float(_) | Self::IntArray(_) | Self::FloatArray(_)
        )
    }

    /// Number of elements; scalars count as one.
    pub fn element_count(&self) -> usize {
        match self {
            Self::Int(_) | Self::Float(_) | Self::Text(_) => 1,
            Self::IntArray(v) => v.len(),
            Self::FloatArray(v) => v.len(),
            Self::TextArray(v) => v.len(),
        }
    }

    /// Interpret a scalar as a number. Text is parsed after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(f64::from(*i)),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Channel kind that carries this payload without conversion.
    pub fn native_kind(&self) -> ValueKind {
        match self {
            Self::Int(_) | Self::IntArray(_) => ValueKind::Int32,
            Self::Float(_) | Self::FloatArray(_) => ValueKind::Float64,
            Self::Text(_) | Self::TextArray(_) => ValueKind::Text,
        }
    }

    /// Render a scalar as text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Convert to the requested channel type, the way a server would.
    ///
    /// Returns `None` when the conversion is impossible (non-numeric text
    /// read as a number, for instance).
    #[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
    pub fn convert(&self, kind: ValueKind) -> Option<Self> {
        let to_int = |f: f64| f.is_finite().then(|| f.round() as i32);
        match kind {
            ValueKind::Generic => Some(self.clone()),
            ValueKind::Float64 => match self {
                Self::IntArray(v) => Some(Self::FloatArray(v.iter().copied().map(f64::from).collect())),
                Self::FloatArray(v) => Some(Self::FloatArray(v.clone())),
                Self::TextArray(v) => v
                    .iter()
                    .map(|s| s.trim().parse().ok())
                    .collect::<Option<Vec<f64>>>()
                    .map(Self::FloatArray),
                scalar => scalar.as_f64().map(Self::Float),
            },
            ValueKind::Int32 => match self {
                Self::Int(i) => Some(Self::Int(*i)),
                Self::Float(f) => to_int(*f).map(Self::Int),
                Self::Text(s) => s.trim().parse().ok().map(Self::Int),
                Self::IntArray(v) => Some(Self::IntArray(v.clone())),
                Self::FloatArray(v) => v
                    .iter()
                    .map(|f| to_int(*f))
                    .collect::<Option<Vec<i32>>>()
                    .map(Self::IntArray),
                Self::TextArray(v) => v
                    .iter()
                    .map(|s| s.trim().parse().ok())
                    .collect::<Option<Vec<i32>>>()
                    .map(Self::IntArray),
            },
            ValueKind::Text => match self {
                Self::IntArray(v) => Some(Self::TextArray(v.iter().map(ToString::to_string).collect())),
                Self::FloatArray(v) => Some(Self::TextArray(v.iter().map(ToString::to_string).collect())),
                Self::TextArray(v) => Some(Self::TextArray(v.clone())),
                scalar => scalar.as_text().map(Self::Text),
            },
        }
    }

    /// Map a JSON value onto a payload. Objects, nulls, booleans and
    /// mixed arrays have no channel representation.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

impl From<f64> for Data {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for Data {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Data {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Data {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// ── BundledMetadata ─────────────────────────────────────────────────

/// Display, alarm and control metadata the server bundles with a value
/// when the channel is read with full metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundledMetadata {
    /// Raw alarm severity code (0..=3).
    pub severity: Option<u16>,
    /// Raw alarm status code (0..=21).
    pub status: Option<u16>,
    pub units: Option<String>,
    pub precision: Option<i16>,
    pub lower_display: Option<f64>,
    pub upper_display: Option<f64>,
    pub lower_warning: Option<f64>,
    pub upper_warning: Option<f64>,
    pub lower_alarm: Option<f64>,
    pub upper_alarm: Option<f64>,
    pub lower_control: Option<f64>,
    pub upper_control: Option<f64>,
    /// Enumerated state labels, ordinal order.
    #[serde(default)]
    pub enum_strings: Vec<String>,
}

// ── PvValue ─────────────────────────────────────────────────────────

/// A value as delivered by a read or a monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PvValue {
    /// Bare scalar or array.
    Plain { data: Data },
    /// Value with origin timestamp and alarm codes.
    Timestamped {
        data: Data,
        timestamp: DateTime<Utc>,
        severity: u16,
        status: u16,
    },
    /// Value with the full display/alarm/control metadata set.
    Control {
        data: Data,
        timestamp: Option<DateTime<Utc>>,
        metadata: Box<BundledMetadata>,
    },
}

impl PvValue {
    pub fn plain(data: impl Into<Data>) -> Self {
        Self::Plain { data: data.into() }
    }

    pub fn data(&self) -> &Data {
        match self {
            Self::Plain { data } | Self::Timestamped { data, .. } | Self::Control { data, .. } => {
                data
            }
        }
    }

    pub fn into_data(self) -> Data {
        match self {
            Self::Plain { data } | Self::Timestamped { data, .. } | Self::Control { data, .. } => {
                data
            }
        }
    }

    /// Origin-supplied timestamp, if the shape carries one.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Plain { .. } => None,
            Self::Timestamped { timestamp, .. } => Some(*timestamp),
            Self::Control { timestamp, .. } => *timestamp,
        }
    }

    /// Metadata bundled with the value. Timestamped values only carry
    /// alarm codes, which are surfaced as a partial metadata set.
    pub fn metadata(&self) -> Option<BundledMetadata> {
        match self {
            Self::Plain { .. } => None,
            Self::Timestamped {
                severity, status, ..
            } => Some(BundledMetadata {
                severity: Some(*severity),
                status: Some(*status),
                ..BundledMetadata::default()
            }),
            Self::Control { metadata, .. } => Some((**metadata).clone()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn float_channel_rejects_non_numeric_text() {
        assert_eq!(Data::from("idle").convert(ValueKind::Float64), None);
        assert_eq!(
            Data::from(" 2.5 ").convert(ValueKind::Float64),
            Some(Data::Float(2.5))
        );
    }

    #[test]
    fn text_channel_renders_everything() {
        assert_eq!(Data::Int(3).convert(ValueKind::Text), Some(Data::from("3")));
        assert_eq!(
            Data::FloatArray(vec![1.5, 2.0]).convert(ValueKind::Text),
            Some(Data::TextArray(vec!["1.5".into(), "2".into()]))
        );
    }

    #[test]
    fn int_channel_rounds_and_rejects_nan() {
        assert_eq!(Data::Float(2.6).convert(ValueKind::Int32), Some(Data::Int(3)));
        assert_eq!(Data::Float(f64::NAN).convert(ValueKind::Int32), None);
    }

    #[test]
    fn labels_distinguish_arrays() {
        assert_eq!(Data::Float(1.0).type_label(), "float64");
        assert_eq!(Data::FloatArray(vec![]).type_label(), "float64[]");
        assert_eq!(Data::from("x").type_label(), "string");
    }

    #[test]
    fn json_numbers_keep_integer_shape() {
        assert_eq!(Data::from_json(&serde_json::json!(2)), Some(Data::Int(2)));
        assert_eq!(Data::from_json(&serde_json::json!(2.5)), Some(Data::Float(2.5)));
        assert_eq!(Data::from_json(&serde_json::json!({"a": 1})), None);
    }

    #[test]
    fn timestamped_exposes_alarm_codes_as_metadata() {
        let v = PvValue::Timestamped {
            data: Data::Float(1.0),
            timestamp: Utc::now(),
            severity: 2,
            status: 3,
        };
        let meta = v.metadata().unwrap();
        assert_eq!(meta.severity, Some(2));
        assert_eq!(meta.status, Some(3));
        assert!(meta.units.is_none());
    }

    #[test]
    fn value_kind_labels() {
        assert_eq!(ValueKind::Text.to_string(), "string");
        assert_eq!(ValueKind::Float64.to_string(), "float64");
        assert!(ValueKind::Int32.is_integer());
        assert_eq!(Data::Int(3).native_kind(), ValueKind::Int32);
        assert_eq!(Data::FloatArray(vec![1.0]).native_kind(), ValueKind::Float64);
        assert_eq!(Data::from("x").native_kind(), ValueKind::Text);
        assert!(!ValueKind::Float64.is_integer());
    }
}

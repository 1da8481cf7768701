// ── Record merge ──
//
// Rebuilds an `AggregateRecord` from a PV's sources: the latest main
// value (with whatever metadata its shape bundles) and the raw auxiliary
// fields. A raw field always beats the same-purpose bundled value; absence
// stays absence. The result depends only on its inputs plus `now`, so
// re-running it from either trigger converges.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pvwatch_api::{BundledMetadata, Data};

use crate::catalog;
use crate::model::{
    AggregateRecord, AlarmLimits, AlarmSeverity, AlarmStatus, ControlLimits, DisplayLimits,
};
use crate::store::PvSources;

/// `Some(v)` for a finite number within `bound`; control systems use NaN,
/// infinities and huge magnitudes to mean "unset".
pub fn sanitize(value: f64, bound: f64) -> Option<f64> {
    (value.is_finite() && value.abs() <= bound).then_some(value)
}

/// Produce the record for `name` from its current sources.
pub fn recompute(name: &str, src: &PvSources, bound: f64, now: DateTime<Utc>) -> AggregateRecord {
    let raw = &src.raw_fields;
    let meta = src
        .main
        .as_ref()
        .and_then(|m| m.value.metadata())
        .unwrap_or_default();
    let value = src.main.as_ref().map(|m| m.value.data().clone());

    let number = |field: &str| raw.get(field).and_then(Data::as_f64).and_then(|v| sanitize(v, bound));
    let text = |field: &str| raw.get(field).and_then(Data::as_text);
    let sane = |v: Option<f64>| v.and_then(|v| sanitize(v, bound));

    let alarm_severity = raw
        .get(catalog::SEVERITY)
        .and_then(AlarmSeverity::from_raw)
        .or_else(|| meta.severity.and_then(AlarmSeverity::from_code))
        .unwrap_or_default();
    let alarm_status = raw
        .get(catalog::STATUS)
        .and_then(AlarmStatus::from_raw)
        .or_else(|| meta.status.and_then(AlarmStatus::from_code))
        .unwrap_or_default();

    let precision = if raw.contains_key(catalog::PRECISION) {
        number(catalog::PRECISION).and_then(precision_from)
    } else {
        meta.precision
    };

    let present = |fields: &[&str]| fields.iter().any(|f| raw.contains_key(*f));

    let display_limits = if present(&[catalog::DISPLAY_LOW, catalog::DISPLAY_HIGH]) {
        DisplayLimits {
            low: number(catalog::DISPLAY_LOW),
            high: number(catalog::DISPLAY_HIGH),
        }
    } else {
        DisplayLimits {
            low: sane(meta.lower_display),
            high: sane(meta.upper_display),
        }
    };

    let alarm_limits = if present(&[
        catalog::ALARM_LOLO,
        catalog::ALARM_LOW,
        catalog::ALARM_HIGH,
        catalog::ALARM_HIHI,
    ]) {
        AlarmLimits {
            lolo: number(catalog::ALARM_LOLO),
            low: number(catalog::ALARM_LOW),
            high: number(catalog::ALARM_HIGH),
            hihi: number(catalog::ALARM_HIHI),
        }
    } else {
        AlarmLimits {
            lolo: sane(meta.lower_alarm),
            low: sane(meta.lower_warning),
            high: sane(meta.upper_warning),
            hihi: sane(meta.upper_alarm),
        }
    };

    let control_limits = if present(&[catalog::DRIVE_LOW, catalog::DRIVE_HIGH]) {
        ControlLimits {
            low: number(catalog::DRIVE_LOW),
            high: number(catalog::DRIVE_HIGH),
        }
    } else {
        ControlLimits {
            low: sane(meta.lower_control),
            high: sane(meta.upper_control),
        }
    };

    let alarm_severities = catalog::SEVERITY_FIELDS
        .iter()
        .filter_map(|f| {
            let sevr = raw.get(*f).and_then(AlarmSeverity::from_raw)?;
            Some(((*f).to_owned(), sevr))
        })
        .collect();

    AggregateRecord {
        name: name.to_owned(),
        value_type: value.as_ref().map(|v| v.type_label().to_owned()),
        element_count: value.as_ref().map(Data::element_count),
        value,
        connection_state: src.state,
        alarm_severity,
        alarm_status,
        units: text(catalog::UNITS).or_else(|| meta.units.clone()),
        precision,
        description: text(catalog::DESCRIPTION),
        display_limits: (!display_limits.is_empty()).then_some(display_limits),
        alarm_limits: (!alarm_limits.is_empty()).then_some(alarm_limits),
        control_limits: (!control_limits.is_empty()).then_some(control_limits),
        alarm_severities,
        raw_fields: raw.clone(),
        state_names: state_names(raw, &meta),
        message: src.message.clone(),
        value_timestamp: src
            .main
            .as_ref()
            .map(|m| m.value.timestamp().unwrap_or(m.observed_at)),
        last_update: now,
    }
}

#[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
fn precision_from(v: f64) -> Option<i16> {
    (v.fract() == 0.0 && v >= f64::from(i16::MIN) && v <= f64::from(i16::MAX)).then_some(v as i16)
}

/// Binary names first, multi-state labels over them; bundled enum strings
/// only when no raw label exists.
fn state_names(raw: &BTreeMap<String, Data>, meta: &BundledMetadata) -> BTreeMap<u16, String> {
    let label = |field: &str| {
        raw.get(field)
            .and_then(Data::as_text)
            .filter(|s| !s.trim().is_empty())
    };

    let mut names = BTreeMap::new();
    for (ordinal, field) in [(0u16, catalog::ZERO_NAME), (1, catalog::ONE_NAME)] {
        if let Some(name) = label(field) {
            names.insert(ordinal, name);
        }
    }
    for field in catalog::STATE_NAME_FIELDS {
        if let (Some(ordinal), Some(name)) = (catalog::state_ordinal(field), label(field)) {
            names.insert(ordinal, name);
        }
    }

    if names.is_empty() {
        for (i, name) in meta.enum_strings.iter().enumerate() {
            if let Ok(ordinal) = u16::try_from(i) {
                if !name.trim().is_empty() {
                    names.insert(ordinal, name.clone());
                }
            }
        }
    }
    names
}

//! Output formatting: JSON, compact JSON, plain.
//!
//! `watch` emits one rendered record per change, so compact JSON doubles as
//! a JSON-lines feed.

use std::io::{self, Write};

use pvwatch_api::Data;
use pvwatch_core::{AggregateRecord, AlarmSeverity};

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

pub fn render_record(format: OutputFormat, record: &AggregateRecord) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(record, false),
        OutputFormat::JsonCompact => render_json(record, true),
        OutputFormat::Plain => Ok(plain_line(record)),
    }
}

/// Render a single field value. Plain output is the bare text.
pub fn render_data(format: OutputFormat, data: &Data) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Plain => Ok(data_text(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(rendered)
}

/// `NAME VALUE [UNITS] STATE [SEVERITY]`; enumerated values show their label.
fn plain_line(record: &AggregateRecord) -> String {
    let value = record
        .state_label()
        .map(str::to_owned)
        .or_else(|| record.value.as_ref().map(data_text))
        .unwrap_or_else(|| "-".into());

    let mut line = format!("{} {value}", record.name);
    if let Some(units) = record.units.as_deref().filter(|u| !u.is_empty()) {
        line.push(' ');
        line.push_str(units);
    }
    line.push(' ');
    line.push_str(&record.connection_state.to_string());
    if record.alarm_severity != AlarmSeverity::NoAlarm {
        line.push(' ');
        line.push_str(&record.alarm_severity.to_string());
    }
    line
}

fn data_text(data: &Data) -> String {
    data.as_text().unwrap_or_else(|| {
        serde_json::to_string(data).unwrap_or_else(|_| data.type_label().to_owned())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pvwatch_core::ConnectionState;

    use super::*;

    #[test]
    fn plain_line_shows_units_and_alarm() {
        let mut rec = AggregateRecord::connecting("SR:CURRENT");
        rec.value = Some(Data::Float(12.5));
        rec.units = Some("mA".into());
        rec.connection_state = ConnectionState::Connected;
        rec.alarm_severity = AlarmSeverity::Minor;
        assert_eq!(plain_line(&rec), "SR:CURRENT 12.5 mA CONNECTED MINOR");
    }

    #[test]
    fn plain_line_prefers_state_label() {
        let mut rec = AggregateRecord::connecting("BI:STATE");
        rec.value = Some(Data::Int(1));
        rec.state_names.insert(0, "Off".into());
        rec.state_names.insert(1, "On".into());
        assert_eq!(plain_line(&rec), "BI:STATE On CONNECTING");
    }

    #[test]
    fn compact_json_is_single_line() {
        let rec = AggregateRecord::connecting("A");
        let out = render_record(OutputFormat::JsonCompact, &rec).unwrap();
        assert!(!out.contains('\n'));
        assert!(out.contains("\"connection_state\":\"CONNECTING\""));
    }
}

//! `pvwatch get` / `pvwatch put`: one-shot reads and writes.

use std::sync::Arc;
use std::time::Duration;

use pvwatch_api::{Data, SimClient};
use pvwatch_core::{AggregateRecord, ConnectionState, Engine};
use tokio::sync::broadcast;
use tokio::time::timeout;

use super::settle;
use crate::cli::{GetArgs, GlobalOpts, PutArgs};
use crate::error::CliError;
use crate::output;

pub async fn get(args: GetArgs, engine: &Engine<SimClient>, global: &GlobalOpts) -> Result<(), CliError> {
    let mut updates = engine.updates();
    let record = open(engine, &args.pv).await?;
    settle(&mut updates, args.settle).await;

    let rendered = match args.field.as_deref() {
        Some(field) => {
            let data = engine
                .get_field(&args.pv, field)
                .ok_or_else(|| CliError::FieldNotFound {
                    pv: args.pv.clone(),
                    field: field.to_owned(),
                })?;
            output::render_data(global.output, &data)?
        }
        None => {
            let latest = engine.get_record(&args.pv).unwrap_or(record);
            output::render_record(global.output, &latest)?
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn put(args: PutArgs, engine: &Engine<SimClient>, global: &GlobalOpts) -> Result<(), CliError> {
    let mut updates = engine.updates();
    let record = open(engine, &args.pv).await?;
    let value = parse_value(&args.value);

    if args.field.is_some() {
        settle(&mut updates, args.settle).await;
    }

    // The write lands through the monitor; show the record once it has.
    let mut after = engine.updates();
    match args.field.as_deref() {
        Some(field) => engine.set_field_value(&args.pv, field, value).await?,
        None => engine.set_value(&args.pv, value).await?,
    }
    let wait = Duration::from_millis(args.settle.quiet_ms);
    let _ = timeout(wait, next_change(&mut after, &args.pv)).await;

    let latest = engine.get_record(&args.pv).unwrap_or(record);
    let rendered = output::render_record(global.output, &latest)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Subscribe and fail unless the main channel came up.
async fn open(engine: &Engine<SimClient>, pv: &str) -> Result<Arc<AggregateRecord>, CliError> {
    let record = engine.subscribe(pv).await?;
    match record.connection_state {
        ConnectionState::Error | ConnectionState::Timeout | ConnectionState::Disconnected => {
            Err(CliError::ChannelFailed {
                name: record.name.clone(),
                state: record.connection_state.to_string(),
                message: record.message.clone().unwrap_or_default(),
            })
        }
        ConnectionState::Connecting | ConnectionState::Connected => Ok(record),
    }
}

async fn next_change(updates: &mut broadcast::Receiver<Arc<AggregateRecord>>, pv: &str) {
    while let Ok(record) = updates.recv().await {
        if record.name == pv {
            return;
        }
    }
}

/// Parse a command-line value as JSON (`3`, `2.5`, `[1, 2]`, `"text"`),
/// falling back to the raw text.
fn parse_value(raw: &str) -> Data {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| Data::from_json(&v))
        .unwrap_or_else(|| Data::Text(raw.to_owned()))
}

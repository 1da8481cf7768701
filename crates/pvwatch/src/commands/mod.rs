//! Command dispatch: loads config, builds the engine, runs a handler.

pub mod access;
pub mod config_cmd;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pvwatch_api::SimClient;
use pvwatch_config::Config;
use pvwatch_core::{AggregateRecord, Engine};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::cli::{Command, GlobalOpts, SettleOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    if let Command::Config(args) = &cmd {
        return config_cmd::handle(args, global);
    }

    let config = load(global)?;
    let engine = build_engine(&config);
    debug!(command = ?cmd, "dispatching command");

    let result = match cmd {
        Command::Watch(args) => watch::handle(args, &engine, global).await,
        Command::Get(args) => access::get(args, &engine, global).await,
        Command::Put(args) => access::put(args, &engine, global).await,
        Command::Config(_) => Ok(()),
    };

    let closed = engine.shutdown();
    result?;
    closed?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────

pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(pvwatch_config::config_path)
}

/// Load and validate the config; warnings go to the log.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let config = pvwatch_config::load_config_from(&config_file(global))?;
    for warning in config.validate()? {
        warn!("{warning}");
    }
    Ok(config)
}

fn build_engine(config: &Config) -> Engine<SimClient> {
    for (key, value) in config.ca.environment() {
        debug!(key, value = %value, "channel access setting");
    }
    let client = SimClient::from_pvs(config.sim.pvs.clone());
    Engine::new(client, config.engine.to_engine_config())
}

/// Drain the change feed until it has been quiet for `quiet_ms`, bounded
/// by `max_wait_ms`. Enrichment tiers publish in bursts separated by their
/// field timeouts, so the quiet window has to outlast the longest tier.
pub async fn settle(updates: &mut broadcast::Receiver<Arc<AggregateRecord>>, opts: SettleOpts) {
    let deadline = Instant::now() + Duration::from_millis(opts.max_wait_ms);
    let quiet = Duration::from_millis(opts.quiet_ms);

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(quiet.min(remaining), updates.recv()).await {
            Ok(Ok(_) | Err(RecvError::Lagged(_))) => {}
            Ok(Err(RecvError::Closed)) | Err(_) => break,
        }
    }
}

//! Clap derive structures for the `pvwatch` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pvwatch -- watch EPICS process variables as enriched records
#[derive(Debug, Parser)]
#[command(
    name = "pvwatch",
    version,
    about = "Watch EPICS process variables as aggregated records",
    long_about = "Subscribes to process variables, probes their auxiliary fields \
        (alarm state, units, limits, state names) and prints one merged record \
        per PV.\n\n\
        PVs are served by the simulated IOC defined under [sim.pvs] in the \
        config file.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "PVWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PVWATCH_OUTPUT",
        default_value = "json",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// One line per record: name, value, units, state, severity
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Subscribe and print every record change until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Subscribe, wait for enrichment, print the record once
    Get(GetArgs),

    /// Write a value to a PV or one of its fields
    Put(PutArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// PV names to watch
    #[arg(required = true)]
    pub pvs: Vec<String>,

    /// Stop after this many seconds
    #[arg(long, short = 'd')]
    pub duration: Option<u64>,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// PV name
    pub pv: String,

    /// Print only this field (`VAL` for the main value)
    #[arg(long, short = 'f')]
    pub field: Option<String>,

    #[command(flatten)]
    pub settle: SettleOpts,
}

#[derive(Debug, Args)]
pub struct PutArgs {
    /// PV name
    pub pv: String,

    /// Value to write; parsed as JSON, otherwise taken as text
    pub value: String,

    /// Write this field instead of the main value
    #[arg(long, short = 'f')]
    pub field: Option<String>,

    #[command(flatten)]
    pub settle: SettleOpts,
}

/// How long to wait for field enrichment before acting.
#[derive(Debug, Clone, Copy, Args)]
pub struct SettleOpts {
    /// Quiet period (ms) with no record change that counts as settled;
    /// must outlast the slowest enrichment tier
    #[arg(long, default_value = "2500")]
    pub quiet_ms: u64,

    /// Upper bound (ms) on the wait
    #[arg(long, default_value = "6000")]
    pub max_wait_ms: u64,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print the EPICS_CA_* environment derived from [ca]
    Env,
    /// Print the config file path
    Path,
}

//! Shared configuration for pvwatch.
//!
//! TOML file + environment loading, Channel Access network settings,
//! engine timing overrides, and simulated PV definitions. Translates to
//! `pvwatch_core::EngineConfig` so the core never reads files itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use pvwatch_api::SimPv;
use pvwatch_core::EngineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Channel Access network settings.
    #[serde(default)]
    pub ca: CaSettings,

    /// Engine timing overrides.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Simulated IOC contents.
    #[serde(default)]
    pub sim: SimSettings,
}

/// Channel Access client network settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CaSettings {
    /// Space-separated server addresses searched for PVs.
    #[serde(default)]
    pub addr_list: String,

    /// Also search every local broadcast address.
    #[serde(default = "default_true")]
    pub auto_addr_list: bool,

    #[serde(default = "default_server_port")]
    pub server_port: u16,

    #[serde(default = "default_repeater_port")]
    pub repeater_port: u16,
}

impl Default for CaSettings {
    fn default() -> Self {
        Self {
            addr_list: String::new(),
            auto_addr_list: true,
            server_port: default_server_port(),
            repeater_port: default_repeater_port(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_server_port() -> u16 {
    5064
}
fn default_repeater_port() -> u16 {
    5065
}

/// Millisecond overrides for `EngineConfig`; unset keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineSettings {
    pub probe_connect_timeout_ms: Option<u64>,
    pub probe_read_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub enrichment_grace_ms: Option<u64>,
    pub put_timeout_ms: Option<u64>,
    pub enrichment: Option<bool>,
    pub sanity_bound: Option<f64>,
    pub update_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SimSettings {
    /// Records served by the simulated IOC, by PV name.
    #[serde(default)]
    pub pvs: BTreeMap<String, SimPv>,
}

// ── Derived settings ────────────────────────────────────────────────

impl CaSettings {
    pub fn addresses(&self) -> Vec<&str> {
        self.addr_list.split_whitespace().collect()
    }

    /// The `EPICS_CA_*` variables a Channel Access client binding reads.
    pub fn environment(&self) -> Vec<(&'static str, String)> {
        vec![
            ("EPICS_CA_ADDR_LIST", self.addresses().join(" ")),
            (
                "EPICS_CA_AUTO_ADDR_LIST",
                if self.auto_addr_list { "YES" } else { "NO" }.to_owned(),
            ),
            ("EPICS_CA_SERVER_PORT", self.server_port.to_string()),
            ("EPICS_CA_REPEATER_PORT", self.repeater_port.to_string()),
        ]
    }
}

impl EngineSettings {
    /// Apply the overrides on top of `EngineConfig::default()`.
    pub fn to_engine_config(&self) -> EngineConfig {
        let ms = |v: Option<u64>, default: Duration| v.map_or(default, Duration::from_millis);
        let base = EngineConfig::default();
        EngineConfig {
            probe_connect_timeout: ms(self.probe_connect_timeout_ms, base.probe_connect_timeout),
            probe_read_timeout: ms(self.probe_read_timeout_ms, base.probe_read_timeout),
            connect_timeout: ms(self.connect_timeout_ms, base.connect_timeout),
            enrichment_grace: ms(self.enrichment_grace_ms, base.enrichment_grace),
            put_timeout: ms(self.put_timeout_ms, base.put_timeout),
            enrichment_enabled: self.enrichment.unwrap_or(base.enrichment_enabled),
            sanity_bound: self.sanity_bound.unwrap_or(base.sanity_bound),
            update_capacity: self.update_capacity.unwrap_or(base.update_capacity),
        }
    }
}

impl Config {
    /// Check the loaded settings. Hard errors are returned; soft problems
    /// come back as warnings for the caller to report.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let ca = &self.ca;
        if ca.server_port == 0 {
            return Err(invalid("ca.server_port", "must be non-zero"));
        }
        if ca.repeater_port == 0 {
            return Err(invalid("ca.repeater_port", "must be non-zero"));
        }
        if ca.server_port == ca.repeater_port {
            return Err(invalid(
                "ca.repeater_port",
                format!("must differ from server_port ({})", ca.server_port),
            ));
        }

        let engine = &self.engine;
        for (field, value) in [
            ("engine.probe_connect_timeout_ms", engine.probe_connect_timeout_ms),
            ("engine.probe_read_timeout_ms", engine.probe_read_timeout_ms),
            ("engine.connect_timeout_ms", engine.connect_timeout_ms),
            ("engine.put_timeout_ms", engine.put_timeout_ms),
        ] {
            if value == Some(0) {
                return Err(invalid(field, "must be non-zero"));
            }
        }
        if engine
            .sanity_bound
            .is_some_and(|bound| !(bound.is_finite() && bound > 0.0))
        {
            return Err(invalid("engine.sanity_bound", "must be a positive number"));
        }
        if engine.update_capacity == Some(0) {
            return Err(invalid("engine.update_capacity", "must be non-zero"));
        }

        let mut warnings = Vec::new();
        if ca.addresses().is_empty() && !ca.auto_addr_list {
            warnings.push(
                "ca.addr_list is empty and auto_addr_list is off; no server will be searched"
                    .to_owned(),
            );
        }
        for (name, pv) in &self.sim.pvs {
            if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
                return Err(invalid("sim.pvs", format!("invalid PV name {name:?}")));
            }
            if pv.unreachable && pv.read_only {
                warnings.push(format!("sim PV {name} is unreachable; read_only has no effect"));
            }
        }
        Ok(warnings)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "pvwatch", "pvwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("pvwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, then `PVWATCH_`-prefixed environment
/// variables (`PVWATCH_CA__ADDR_LIST`, `PVWATCH_ENGINE__PUT_TIMEOUT_MS`).
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PVWATCH_").split("__"));

    let config: Config = figment.extract()?;
    tracing::debug!(path = %path.display(), pvs = config.sim.pvs.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use pvwatch_api::Data;

    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.ca, CaSettings::default());
        assert_eq!(cfg.engine.to_engine_config(), EngineConfig::default());
        assert!(cfg.sim.pvs.is_empty());
    }

    #[test]
    fn loads_ca_engine_and_sim_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
[ca]
addr_list = "10.0.0.255  10.0.1.255"
auto_addr_list = false

[engine]
put_timeout_ms = 1500
enrichment = false

[sim.pvs."SR:CURRENT"]
value = 12.345
fields = { DESC = "Beam Current", EGU = "mA", PREC = 2 }

[sim.pvs."RO:MODE"]
value = "idle"
read_only = true
"#,
        );
        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg.ca.addresses(), vec!["10.0.0.255", "10.0.1.255"]);
        assert!(!cfg.ca.auto_addr_list);
        assert_eq!(cfg.ca.server_port, 5064);

        let engine = cfg.engine.to_engine_config();
        assert_eq!(engine.put_timeout, Duration::from_millis(1500));
        assert!(!engine.enrichment_enabled);
        assert_eq!(engine.connect_timeout, Duration::from_millis(500));

        let beam = &cfg.sim.pvs["SR:CURRENT"];
        assert_eq!(beam.value, Data::Float(12.345));
        assert_eq!(beam.fields.get("PREC"), Some(&Data::Int(2)));
        assert!(cfg.sim.pvs["RO:MODE"].read_only);
    }

    #[test]
    fn ca_environment_rendering() {
        let ca = CaSettings {
            addr_list: " 10.0.0.255 ".into(),
            auto_addr_list: false,
            ..CaSettings::default()
        };
        assert_eq!(
            ca.environment(),
            vec![
                ("EPICS_CA_ADDR_LIST", "10.0.0.255".to_owned()),
                ("EPICS_CA_AUTO_ADDR_LIST", "NO".to_owned()),
                ("EPICS_CA_SERVER_PORT", "5064".to_owned()),
                ("EPICS_CA_REPEATER_PORT", "5065".to_owned()),
            ]
        );
    }

    #[test]
    fn validation_rejects_port_clash() {
        let mut cfg = Config::default();
        cfg.ca.repeater_port = cfg.ca.server_port;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Validation { field, .. }) if field == "ca.repeater_port"
        ));
    }

    #[test]
    fn validation_rejects_zero_timeouts_and_bad_bound() {
        let mut cfg = Config::default();
        cfg.engine.put_timeout_ms = Some(0);
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.engine.sanity_bound = Some(f64::NAN);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_warns_without_any_search_path() {
        let mut cfg = Config::default();
        assert!(cfg.validate().unwrap().is_empty());

        cfg.ca.auto_addr_list = false;
        let warnings = cfg.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("addr_list"));
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.ca.addr_list = "192.168.1.255".into();
        cfg.engine.connect_timeout_ms = Some(750);
        cfg.sim
            .pvs
            .insert("A".into(), SimPv::new(1.5).with_field("EGU", "V"));
        save_config_to(&cfg, &path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }
}

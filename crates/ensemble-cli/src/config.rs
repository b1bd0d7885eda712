use anyhow::{Context, Result, bail};
use ensemble_core::{DispatchConfig, DomainPack, MAX_TIMING};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub pack: PackSection,
    #[serde(default)]
    pub roster: RosterSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

// ── Dispatch timing ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSection {
    #[serde(default = "default_thinking_latency_ms")]
    pub thinking_latency_ms: u64,
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
}

fn default_thinking_latency_ms() -> u64 {
    1500
}

fn default_stagger_ms() -> u64 {
    1000
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            thinking_latency_ms: default_thinking_latency_ms(),
            stagger_ms: default_stagger_ms(),
        }
    }
}

impl DispatchSection {
    pub fn to_dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            thinking_latency: Duration::from_millis(self.thinking_latency_ms),
            stagger: Duration::from_millis(self.stagger_ms),
        }
    }
}

// ── Domain pack ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackSection {
    /// Built-in pack name, ignored when `file` is set
    #[serde(default = "default_pack_name")]
    pub name: String,
    /// Path to a TOML pack definition
    #[serde(default)]
    pub file: Option<String>,
}

fn default_pack_name() -> String {
    "marketing".to_string()
}

impl Default for PackSection {
    fn default() -> Self {
        Self {
            name: default_pack_name(),
            file: None,
        }
    }
}

// ── Roster overrides ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterSection {
    /// Agent ids that start switched off
    #[serde(default)]
    pub inactive: Vec<String>,
}

// ── Session ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_true")]
    pub show_welcome: bool,
    /// Capacity of the event channel between the session and the printer
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            show_welcome: true,
            event_capacity: default_event_capacity(),
        }
    }
}

// ── Logging ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `--debug` and `RUST_LOG` are absent
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ensemble")
}

impl EnsembleConfig {
    /// Load the config file. An explicit path must exist; the default path
    /// falls back to built-in defaults when missing.
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = match custom_path {
            Some(p) => p.clone(),
            None => {
                let default_path = config_dir().join("config.toml");
                if !default_path.exists() {
                    debug!("No config at {}, using defaults", default_path.display());
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;

        // Expand environment variables before parsing
        let expanded = expand_env_vars(&content);

        let config: Self = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let max_ms = MAX_TIMING.as_millis();
        if self.dispatch.stagger_ms == 0 {
            bail!("dispatch.stagger_ms must be greater than zero");
        }
        if u128::from(self.dispatch.stagger_ms) > max_ms {
            bail!("dispatch.stagger_ms must be at most {} (24h)", max_ms);
        }
        if u128::from(self.dispatch.thinking_latency_ms) > max_ms {
            bail!("dispatch.thinking_latency_ms must be at most {} (24h)", max_ms);
        }
        if self.session.event_capacity == 0 {
            bail!("session.event_capacity must be greater than zero");
        }
        Ok(())
    }

    /// Resolve the configured domain pack and apply roster overrides
    pub fn load_pack(&self) -> Result<DomainPack> {
        let mut pack = match &self.pack.file {
            Some(file) => {
                let path = shellexpand(file);
                DomainPack::from_file(&path)
                    .with_context(|| format!("Failed to load pack file {}", path.display()))?
            }
            None => DomainPack::builtin(&self.pack.name)
                .with_context(|| format!("Unknown pack '{}'", self.pack.name))?,
        };

        for id in &self.roster.inactive {
            if let Err(e) = pack.roster.set_initial_active(id, false) {
                warn!("Ignoring roster override: {}", e);
            }
        }
        Ok(pack)
    }
}

/// Variables a config (mostly `pack.file`) may reference as `${NAME}`
const PATH_ENV_VARS: &[&str] = &["HOME", "USER", "ENSEMBLE_PACK_DIR"];

/// Substitute `${NAME}` for the path variables above. Any other reference
/// is left as written and logged.
fn expand_env_vars(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(open) = rest.find("${") {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        let name = &rest[open + 2..open + len];
        out.push_str(&rest[..open]);
        if PATH_ENV_VARS.contains(&name) {
            out.push_str(&std::env::var(name).unwrap_or_default());
        } else {
            warn!("Config references ${{{}}}, which is not expanded", name);
            out.push_str(&rest[open..=open + len]);
        }
        rest = &rest[open + len + 1..];
    }
    out.push_str(rest);
    out
}

// Expand a leading ~ in paths
fn shellexpand(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(s)
}

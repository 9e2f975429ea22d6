use std::path::{Path, PathBuf};

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ExitError;

/// Config file name constants.
pub const CONFIG_TOML: &str = ".convobot.toml";
pub const CONFIG_JSON: &str = ".convobot.json";

/// Find the config file in `dir`, preferring .convobot.toml over .convobot.json.
/// Returns None if neither exists.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    let toml_path = dir.join(CONFIG_TOML);
    if toml_path.exists() {
        return Some(toml_path);
    }
    let json_path = dir.join(CONFIG_JSON);
    if json_path.exists() {
        return Some(json_path);
    }
    None
}

/// Find config in the standard locations.
///
/// Priority order (highest first):
/// 1. `.convobot.toml` / `.convobot.json` in `dir`
/// 2. `<config_dir>/convobot/config.toml` (e.g. `~/.config/convobot/config.toml`)
pub fn find_config_in(dir: &Path) -> Option<PathBuf> {
    find_config(dir).or_else(|| {
        let user = dirs::config_dir()?.join("convobot").join("config.toml");
        user.exists().then_some(user)
    })
}

/// Load the config from an explicit path, the standard locations, or defaults.
pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path);
    }
    let cwd = std::env::current_dir().context("reading current directory")?;
    match find_config_in(&cwd) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            Config::load(&path)
        }
        None => {
            tracing::debug!("no config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Top-level .convobot.toml config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub seen: SeenConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Command recognition and identity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BotConfig {
    /// Display name of the bot. Resolved from conversation participants when unset.
    #[serde(default)]
    pub name: Option<String>,
    /// Group messages starting with one of these are commands. `{bot}` is the bot name.
    #[serde(default = "default_affixes", alias = "commandPrefixes")]
    pub command_prefixes: Vec<String>,
    /// Group messages ending with one of these are commands. `{bot}` is the bot name.
    #[serde(default = "default_affixes", alias = "commandSuffixes")]
    pub command_suffixes: Vec<String>,
    /// Let the bot trigger commands with its own messages.
    #[serde(default, alias = "selfCommands")]
    pub self_commands: bool,
    /// In a one-on-one conversation with a single participant, treat the bot's
    /// own messages as if `self_commands` were set.
    #[serde(default = "default_true", alias = "soloCountsAsSelf")]
    pub solo_counts_as_self: bool,
    /// Log outgoing messages instead of sending them.
    #[serde(default, alias = "safeMode")]
    pub safe_mode: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: None,
            command_prefixes: default_affixes(),
            command_suffixes: default_affixes(),
            self_commands: false,
            solo_counts_as_self: true,
            safe_mode: false,
        }
    }
}

/// Seen marking and transcript retention.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SeenConfig {
    /// Mark processed messages so they are not read twice.
    #[serde(default = "default_true", alias = "markSeen")]
    pub mark_seen: bool,
    /// Keep at most this many message batches after each read. 0 keeps everything.
    #[serde(default = "default_retention_window", alias = "retentionWindow")]
    pub retention_window: usize,
}

impl Default for SeenConfig {
    fn default() -> Self {
        Self {
            mark_seen: true,
            retention_window: default_retention_window(),
        }
    }
}

/// Driving loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms", alias = "intervalMs")]
    pub interval_ms: u64,
    #[serde(default = "default_true", alias = "unseenOnly")]
    pub unseen_only: bool,
    /// Stop after this many full passes. Unset runs until shutdown.
    #[serde(default, alias = "maxPasses")]
    pub max_passes: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            unseen_only: true,
            max_passes: None,
        }
    }
}

/// External driver program used by the process transport.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransportConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the operation verb.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs", alias = "timeoutSecs")]
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Default value functions for serde
fn default_affixes() -> Vec<String> { vec!["@{bot}".into()] }
fn default_true() -> bool { true }
fn default_retention_window() -> usize { 30 }
fn default_interval_ms() -> u64 { 1000 }
fn default_program() -> String { "convobot-driver".into() }
fn default_timeout_secs() -> u64 { 5 }

impl Config {
    /// Load config from a file (TOML or JSON, auto-detected by extension).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "toml" => Self::parse_toml(&contents),
            "json" => Self::parse_json(&contents),
            _ => {
                // Try TOML first, then JSON
                Self::parse_toml(&contents).or_else(|_| Self::parse_json(&contents))
            }
        }
    }

    /// Parse config from a TOML string.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| ExitError::Config(format!("invalid .convobot.toml: {e}")).into())
    }

    /// Parse config from a JSON string.
    pub fn parse_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ExitError::Config(format!("invalid .convobot.json: {e}")).into())
    }
}

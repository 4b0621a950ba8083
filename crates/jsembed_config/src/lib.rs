//! Configuration for embedding a script engine with `jsembed`.
//!
//! The configuration lives in a JSON file (`jsembed.json` by default). Every
//! field has a default, so an empty object or a missing section is valid.

use std::time::Duration;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name reported to scripts as `process.argv[0]` and `process.title`
    pub program_name: String,

    /// Arguments exposed to scripts after the program name
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Directories searched when a script or the host requires a bare module name
    pub module_paths: Vec<Utf8PathBuf>,

    pub engine: EngineConfig,

    pub event_loop: EventLoopConfig,

    pub shutdown: ShutdownConfig,

    #[serde(skip)]
    path: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            program_name: "jsembed".into(),
            args: vec![],
            module_paths: vec![Utf8PathBuf::from("node_modules")],
            engine: EngineConfig::default(),
            event_loop: EventLoopConfig::default(),
            shutdown: ShutdownConfig::default(),
            path: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Utf8PathBuf {
        Utf8PathBuf::from("jsembed.json")
    }

    #[must_use]
    pub fn with_path(mut self, path: &Utf8Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }

    /// Path this configuration was loaded from or will be saved to
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    /// Loads configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid configuration JSON
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let cfg: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {path}"))?;
        debug!("Loaded configuration from {path}");

        Ok(cfg.with_path(path))
    }

    /// Loads configuration from `path` if it exists, otherwise returns the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded
    pub fn load_or_default(path: &Utf8Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config file at {path}, using defaults");
            Ok(Self::default().with_path(path))
        }
    }

    /// Writes the configuration back to the path it was loaded from
    ///
    /// # Errors
    ///
    /// Returns an error if no path is set or the file cannot be written
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .context("Config has no path, use `with_path` before saving")?;

        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent}"))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).with_context(|| format!("Failed to write {path}"))?;

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound of the V8 heap in megabytes, engine default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_heap_mb: Option<usize>,
}

impl EngineConfig {
    pub fn max_heap_bytes(&self) -> Option<usize> {
        self.max_heap_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Longest time a single pass of `run_event_loop` waits for pending work
    /// before handing control back to the host tick
    pub tick_interval_ms: u64,

    /// Pause between ticks when no work is pending
    pub idle_sleep_ms: u64,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            idle_sleep_ms: 1,
        }
    }
}

impl EventLoopConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long deinitialization waits for pending work, forever when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain_timeout_ms: Option<u64>,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_ms.map(Duration::from_millis)
    }
}

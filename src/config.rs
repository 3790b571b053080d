//! Configuration for the converter and export jobs.
//!
//! Settings load from a TOML file with these sections:
//! - `[converter]` - leader defaults and UTF-8 forcing
//! - `[plan]` - batch size, retries and failure policy
//! - `[executor]` - worker threads and channel capacity
//! - `[exporters.default]` - chunk sizes and bundler for every exporter
//! - `[exporters.<name>]` - overrides for one exporter type
//!
//! Every section and key is optional.
//!
//! ```
//! use sierra_marc::config::{BundlerKind, ExportSettings};
//!
//! let settings = ExportSettings::from_toml_str(r#"
//!     [plan]
//!     batch_size = 50
//!
//!     [exporters.default]
//!     max_rec_chunk = 500
//!
//!     [exporters.BibsToSolr]
//!     max_del_chunk = 250
//!     bundler = "key_range"
//! "#).unwrap();
//!
//! let bibs = settings.exporter("BibsToSolr");
//! assert_eq!(bibs.max_rec_chunk, 500);
//! assert_eq!(bibs.max_del_chunk, 250);
//! assert_eq!(bibs.bundler, BundlerKind::KeyRange);
//! assert_eq!(settings.exporter("ItemsToSolr").max_del_chunk, 1000);
//! ```

use crate::leader::Leader;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Whole settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Converter settings.
    pub converter: ConverterConfig,
    /// Job plan settings.
    pub plan: PlanConfig,
    /// Chunk executor settings.
    pub executor: ExecutorConfig,
    /// Per-exporter sections; `default` applies to all of them.
    pub exporters: HashMap<String, ExporterSection>,
}

/// `[converter]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Mark written records as UTF-8 (leader position 9).
    pub force_utf8: bool,
    /// Leader that leader-field rows are overlaid on.
    pub base_leader: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            force_utf8: true,
            base_leader: Leader::default().to_string(),
        }
    }
}

impl ConverterConfig {
    /// Parse [`ConverterConfig::base_leader`].
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid 24-character leader.
    pub fn leader(&self) -> Result<Leader> {
        self.base_leader
            .parse()
            .with_context(|| format!("Invalid converter.base_leader: {:?}", self.base_leader))
    }
}

/// `[plan]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Chunks per batch.
    pub batch_size: usize,
    /// Extra attempts for a failed chunk before it counts as failed.
    pub max_retries: u32,
    /// Stop dispatching further batches once a chunk fails for good.
    pub escalate_on_chunk_failure: bool,
    /// Error count at which a job ends as `errors` rather than
    /// `done_with_errors`. Unset means never.
    pub errors_threshold: Option<u64>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            max_retries: 0,
            escalate_on_chunk_failure: false,
            errors_threshold: None,
        }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Worker threads (0 = one per core).
    pub threads: usize,
    /// Capacity of the bounded outcome channel.
    pub channel_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            channel_capacity: 64,
        }
    }
}

/// How an exporter packs record keys into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundlerKind {
    /// Each chunk stores its explicit list of keys.
    #[default]
    ExplicitKey,
    /// Each chunk stores first key, last key and count.
    KeyRange,
}

/// One `[exporters.*]` section; unset keys fall through.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExporterSection {
    /// Maximum records per export chunk.
    pub max_rec_chunk: Option<usize>,
    /// Maximum records per deletion chunk.
    pub max_del_chunk: Option<usize>,
    /// Bundling strategy.
    pub bundler: Option<BundlerKind>,
}

/// Resolved settings for one exporter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExporterConfig {
    /// Maximum records per export chunk.
    pub max_rec_chunk: usize,
    /// Maximum records per deletion chunk.
    pub max_del_chunk: usize,
    /// Bundling strategy.
    pub bundler: BundlerKind,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            max_rec_chunk: 3000,
            max_del_chunk: 1000,
            bundler: BundlerKind::ExplicitKey,
        }
    }
}

impl ExporterConfig {
    fn overlay(mut self, section: &ExporterSection) -> Self {
        if let Some(n) = section.max_rec_chunk {
            self.max_rec_chunk = n;
        }
        if let Some(n) = section.max_del_chunk {
            self.max_del_chunk = n;
        }
        if let Some(b) = section.bundler {
            self.bundler = b;
        }
        self
    }
}

impl ExportSettings {
    /// Load and validate a settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read, isn't valid TOML, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: ExportSettings = toml::from_str(content).context("Invalid TOML")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values that would make a job impossible to plan.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        self.converter.leader()?;
        if self.plan.batch_size == 0 {
            bail!("plan.batch_size must be at least 1");
        }
        if self.executor.channel_capacity == 0 {
            bail!("executor.channel_capacity must be at least 1");
        }
        for (name, section) in &self.exporters {
            if section.max_rec_chunk == Some(0) || section.max_del_chunk == Some(0) {
                bail!("exporters.{name}: chunk sizes must be at least 1");
            }
        }
        Ok(())
    }

    /// Settings for exporter type `name`: built-in defaults, then
    /// `[exporters.default]`, then `[exporters.<name>]`.
    #[must_use]
    pub fn exporter(&self, name: &str) -> ExporterConfig {
        let mut config = ExporterConfig::default();
        if let Some(section) = self.exporters.get("default") {
            config = config.overlay(section);
        }
        if let Some(section) = self.exporters.get(name) {
            config = config.overlay(section);
        }
        config
    }
}

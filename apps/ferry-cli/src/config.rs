//! Run configuration management.
//!
//! Configuration lives in a TOML file (default `ferry.toml` in the working
//! directory). When the file is missing, a template is written and the
//! process exits with instructions instead of prompting interactively.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use ferry_pipeline::{DEFAULT_CONCURRENCY, DEFAULT_RELAY_DELAY, RunConfig};
use serde::{Deserialize, Serialize};

/// On-disk configuration for a transfer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FerryConfig {
    /// Root of the source collection.
    pub source_dir: PathBuf,
    /// Root of the destination collection.
    pub dest_dir: PathBuf,
    /// Directory holding staged copies during a run.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// SQLite database holding transfer records.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Maximum number of items in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Pause between the dedupe decision and the relay, in seconds.
    #[serde(default = "default_relay_delay_secs")]
    pub relay_delay_secs: u64,
    /// Optional deadline for each fetch and relay, in seconds.
    #[serde(default)]
    pub transfer_timeout_secs: Option<u64>,
    /// Fetch and hash items without contacting the destination.
    #[serde(default)]
    pub dry_run: bool,
    /// Delete staged copies once their outcome is recorded.
    #[serde(default = "default_auto_cleanup")]
    pub auto_cleanup: bool,
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("staging")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("transfers.db")
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_relay_delay_secs() -> u64 {
    DEFAULT_RELAY_DELAY.as_secs()
}

fn default_auto_cleanup() -> bool {
    true
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            dest_dir: PathBuf::new(),
            staging_dir: default_staging_dir(),
            db_path: default_db_path(),
            concurrency: default_concurrency(),
            relay_delay_secs: default_relay_delay_secs(),
            transfer_timeout_secs: None,
            dry_run: false,
            auto_cleanup: default_auto_cleanup(),
        }
    }
}

impl FerryConfig {
    /// Loads the configuration, writing a template on first run.
    ///
    /// The defaults are not runnable (source and destination are empty),
    /// so a fresh template is reported as an error telling the user what
    /// to fill in.
    pub fn load_or_init(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            Self::default().save(path)?;
            anyhow::bail!(
                "no configuration found; wrote a template to {}. \
                 Set source_dir and dest_dir, then run again",
                path.display()
            );
        }
        Self::load(path)
    }

    /// Loads configuration from `path`, validating required fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration to `path` as TOML.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let content = toml::to_string_pretty(self).context("serializing configuration")?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.source_dir.as_os_str().is_empty() {
            anyhow::bail!("source_dir is not set in the configuration");
        }
        if self.dest_dir.as_os_str().is_empty() {
            anyhow::bail!("dest_dir is not set in the configuration");
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        Ok(())
    }

    /// Converts the on-disk form into the pipeline's run configuration.
    pub fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::new(self.staging_dir.clone());
        config.concurrency = self.concurrency;
        config.relay_delay = Duration::from_secs(self.relay_delay_secs);
        config.dry_run = self.dry_run;
        config.auto_cleanup = self.auto_cleanup;
        config.transfer_timeout = self.transfer_timeout_secs.map(Duration::from_secs);
        config
    }
}

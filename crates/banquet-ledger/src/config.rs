//! # Ledger Configuration
//!
//! Configuration management for the ledger engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BANQUET_DB_PATH=/srv/banquet/ledger.db                             │
//! │     BANQUET_GRAND_TOTAL_POLICY=shared_once                             │
//! │     BANQUET_OUTBOX_POLL_SECS=10                                        │
//! │     BANQUET_ALLOCATION_MAX_ELAPSED_MS=3000                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/ledger/ledger.toml (Linux)                               │
//! │     ~/Library/Application Support/com.banquet.ledger/ledger.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ./ledger.db, per_menu_row, 5s mirror poll                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # ledger.toml
//! [database]
//! path = "/srv/banquet/ledger.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [estimate]
//! grand_total_policy = "per_menu_row"  # per_menu_row | shared_once
//!
//! [allocation]
//! initial_interval_ms = 50
//! max_interval_ms = 1000
//! max_elapsed_ms = 5000
//!
//! [outbox]
//! poll_interval_secs = 5
//! batch_size = 100
//! max_attempts = 10
//! ```

use banquet_core::GrandTotalPolicy;
use banquet_db::DbConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Where the ledger lives and how writers queue on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long one writer waits on SQLite's lock before reporting busy.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ledger.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Estimate Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimateSettings {
    /// How hall charges, meals and GST enter the grand total when several
    /// menus are selected.
    #[serde(default)]
    pub grand_total_policy: GrandTotalPolicy,
}

// =============================================================================
// Allocation Settings
// =============================================================================

/// Retry budget for serial allocation under write-lock contention.
///
/// ## Backoff Timeline
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  attempt 1 ── busy ── 50ms ── attempt 2 ── busy ── 100ms ── ...        │
/// │                                                                         │
/// │  intervals double up to max_interval_ms; once max_elapsed_ms has       │
/// │  passed the caller gets AllocationExhausted ("try again")              │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationSettings {
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,

    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_ms: u64,
}

fn default_initial_interval() -> u64 {
    50
}
fn default_max_interval() -> u64 {
    1_000
}
fn default_max_elapsed() -> u64 {
    5_000
}

impl Default for AllocationSettings {
    fn default() -> Self {
        AllocationSettings {
            initial_interval_ms: default_initial_interval(),
            max_interval_ms: default_max_interval(),
            max_elapsed_ms: default_max_elapsed(),
        }
    }
}

// =============================================================================
// Outbox Settings
// =============================================================================

/// Mirror outbox replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxSettings {
    /// Interval between replay passes (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Mirrors replayed per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Attempts before a mirror is left for an operator.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Applied rows older than this are purged (days).
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_poll_interval() -> u64 {
    5
}
fn default_batch_size() -> u32 {
    100
}
fn default_max_attempts() -> u32 {
    10
}
fn default_retention_days() -> u32 {
    30
}

impl Default for OutboxSettings {
    fn default() -> Self {
        OutboxSettings {
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            retention_days: default_retention_days(),
        }
    }
}

// =============================================================================
// Main Ledger Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub estimate: EstimateSettings,

    #[serde(default)]
    pub allocation: AllocationSettings,

    #[serde(default)]
    pub outbox: OutboxSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (explicit path, else `ledger.toml` in the config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let explicit = config_path.is_some();
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                config = Self::read_file(&path)?;
            } else if explicit {
                return Err(LedgerError::ConfigLoadFailed(format!(
                    "{} does not exist",
                    path.display()
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads a single file without environment overrides.
    pub fn load_from(path: &Path) -> LedgerResult<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> LedgerResult<Self> {
        info!(?path, "Loading ledger config from file");
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(LedgerError::Config("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(LedgerError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.outbox.batch_size == 0 {
            return Err(LedgerError::Config("outbox.batch_size must be greater than 0".into()));
        }
        if self.outbox.poll_interval_secs == 0 {
            return Err(LedgerError::Config(
                "outbox.poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.outbox.max_attempts == 0 {
            return Err(LedgerError::Config("outbox.max_attempts must be greater than 0".into()));
        }
        if self.allocation.initial_interval_ms == 0
            || self.allocation.initial_interval_ms > self.allocation.max_interval_ms
        {
            return Err(LedgerError::Config(
                "allocation.initial_interval_ms must be between 1 and max_interval_ms".into(),
            ));
        }
        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BANQUET_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(policy) = std::env::var("BANQUET_GRAND_TOTAL_POLICY") {
            match policy.parse() {
                Ok(parsed) => self.estimate.grand_total_policy = parsed,
                Err(e) => warn!(policy = %policy, error = %e, "Ignoring grand total policy from environment"),
            }
        }

        if let Ok(secs) = std::env::var("BANQUET_OUTBOX_POLL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.outbox.poll_interval_secs = s;
            }
        }

        if let Ok(ms) = std::env::var("BANQUET_ALLOCATION_MAX_ELAPSED_MS") {
            if let Ok(m) = ms.parse::<u64>() {
                self.allocation.max_elapsed_ms = m;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "banquet", "ledger")
            .map(|dirs| dirs.config_dir().join("ledger.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pool settings for [`banquet_db::Database::new`].
    pub fn to_db_config(&self) -> DbConfig {
        let config = if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
        };
        config.busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn grand_total_policy(&self) -> GrandTotalPolicy {
        self.estimate.grand_total_policy
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.outbox.poll_interval_secs)
    }
}

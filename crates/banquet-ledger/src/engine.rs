//! # Ledger Engine
//!
//! Wires configuration, the database and every service together, and owns
//! the background tasks.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          LedgerEngine                                   │
//! │                                                                         │
//! │   LedgerConfig ──► Database (pool, migrations, change feed)             │
//! │                                                                         │
//! │   services (cheap clones over one Database):                            │
//! │     writer()  collections()  reporter()  transfer()  bookings()        │
//! │                                                                         │
//! │   start() spawns:                                                       │
//! │     ┌────────────────┐        ┌────────────────┐                        │
//! │     │MirrorProcessor │        │  LedgerWatch   │                        │
//! │     │ replays queued │        │ live report on │                        │
//! │     │ copies         │        │ every commit   │                        │
//! │     └────────────────┘        └────────────────┘                        │
//! │   shutdown() stops both                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use banquet_db::Database;
use serde::Serialize;
use tracing::info;

use crate::bookings::BookingService;
use crate::collect::Collections;
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::mirror::{MirrorProcessor, MirrorProcessorHandle};
use crate::reports::LedgerReporter;
use crate::transfer::LedgerTransfer;
use crate::watch::{LedgerWatch, LedgerWatchHandle};
use crate::writer::LedgerWriter;

/// Outbox health, for status displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub running: bool,
    /// Copies still waiting to be applied.
    pub pending_mirrors: i64,
    /// Copies that gave up after `max_attempts`.
    pub exhausted_mirrors: usize,
}

pub struct LedgerEngine {
    config: LedgerConfig,
    db: Database,
    mirror_handle: Option<MirrorProcessorHandle>,
    watch_handle: Option<LedgerWatchHandle>,
}

impl LedgerEngine {
    /// Validates the config and opens the database it names.
    pub async fn open(config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        let db = Database::new(config.to_db_config()).await?;
        info!(
            path = %config.database.path.display(),
            policy = %config.grand_total_policy(),
            "Ledger engine opened"
        );
        Ok(Self::with_database(config, db))
    }

    pub fn with_database(config: LedgerConfig, db: Database) -> Self {
        LedgerEngine {
            config,
            db,
            mirror_handle: None,
            watch_handle: None,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn writer(&self) -> LedgerWriter {
        LedgerWriter::new(self.db.clone(), self.config.allocation.clone())
    }

    pub fn collections(&self) -> Collections {
        Collections::new(self.db.clone(), self.config.allocation.clone())
    }

    pub fn reporter(&self) -> LedgerReporter {
        LedgerReporter::new(self.db.clone())
    }

    pub fn transfer(&self) -> LedgerTransfer {
        LedgerTransfer::new(self.db.clone(), self.config.allocation.clone())
    }

    pub fn bookings(&self) -> BookingService {
        BookingService::new(self.writer(), self.config.grand_total_policy())
    }

    /// Spawns the mirror processor and the live ledger view. Calling it
    /// twice is a no-op.
    pub async fn start(&mut self) -> LedgerResult<LedgerWatchHandle> {
        if let Some(handle) = &self.watch_handle {
            return Ok(handle.clone());
        }

        let (processor, mirror_handle) = MirrorProcessor::new(self.db.clone(), self.config.outbox.clone());
        let (watch, watch_handle) = LedgerWatch::new(self.db.clone(), None).await?;

        tokio::spawn(processor.run());
        tokio::spawn(watch.run());

        self.mirror_handle = Some(mirror_handle);
        self.watch_handle = Some(watch_handle.clone());
        info!("Ledger engine started");
        Ok(watch_handle)
    }

    pub async fn status(&self) -> LedgerResult<EngineStatus> {
        let outbox = self.db.outbox();
        Ok(EngineStatus {
            running: self.watch_handle.is_some(),
            pending_mirrors: outbox.count_pending().await?,
            exhausted_mirrors: outbox.exhausted(self.config.outbox.max_attempts).await?.len(),
        })
    }

    /// Stops background tasks and closes the pool.
    pub async fn shutdown(&mut self) -> LedgerResult<()> {
        info!("Shutting down ledger engine");

        if let Some(handle) = self.mirror_handle.take() {
            let _ = handle.shutdown().await;
        }
        if let Some(handle) = self.watch_handle.take() {
            let _ = handle.shutdown().await;
        }
        self.db.close().await;

        info!("Ledger engine stopped");
        Ok(())
    }
}

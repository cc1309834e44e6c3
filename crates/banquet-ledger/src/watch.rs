//! # Live Ledger View
//!
//! Keeps a [`LedgerReport`] current by listening to committed document
//! changes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WriteTx::commit ──► broadcast<DocumentChange>                          │
//! │                             │                                           │
//! │                             ▼                                           │
//! │  LedgerWatch: moneyReceipts/* or receivedMoney/* ?                      │
//! │               drain whatever else is queued (one rebuild per burst)     │
//! │               rebuild report from the full snapshot                     │
//! │                             │                                           │
//! │                             ▼                                           │
//! │  watch<LedgerReport> ──► every subscriber sees the latest report        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A lagging receiver has lost changes it cannot name, so it rebuilds.

use banquet_core::LedgerReport;
use banquet_db::{collection, Database, DocumentChange};
use chrono::NaiveDate;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::reports::LedgerReporter;

fn affects_ledger(change: &DocumentChange) -> bool {
    change.collection == collection::MONEY_RECEIPTS || change.collection == collection::RECEIVED_MONEY
}

/// Background task that republishes the ledger report after relevant commits.
pub struct LedgerWatch {
    reporter: LedgerReporter,
    period_start: Option<NaiveDate>,
    changes: broadcast::Receiver<DocumentChange>,
    report_tx: watch::Sender<LedgerReport>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for reading the live report and stopping the watch.
#[derive(Clone)]
pub struct LedgerWatchHandle {
    report_rx: watch::Receiver<LedgerReport>,
    shutdown_tx: mpsc::Sender<()>,
}

impl LedgerWatchHandle {
    pub fn subscribe(&self) -> watch::Receiver<LedgerReport> {
        self.report_rx.clone()
    }

    /// Latest published report.
    pub fn current(&self) -> LedgerReport {
        self.report_rx.borrow().clone()
    }

    pub async fn shutdown(&self) -> LedgerResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| LedgerError::Internal("Ledger watch already stopped".into()))
    }
}

impl LedgerWatch {
    /// Subscribes to changes, then builds the initial report, so no commit
    /// can slip between the two.
    pub async fn new(db: Database, period_start: Option<NaiveDate>) -> LedgerResult<(Self, LedgerWatchHandle)> {
        let changes = db.subscribe();
        let reporter = LedgerReporter::new(db);
        let initial = reporter.report(period_start).await?;

        let (report_tx, report_rx) = watch::channel(initial);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let watch = LedgerWatch {
            reporter,
            period_start,
            changes,
            report_tx,
            shutdown_rx,
        };
        Ok((watch, LedgerWatchHandle { report_rx, shutdown_tx }))
    }

    /// Runs until shut down. Spawn it as a background task.
    pub async fn run(mut self) {
        info!("Ledger watch starting");

        loop {
            tokio::select! {
                change = self.changes.recv() => match change {
                    Ok(change) => {
                        let mut dirty = affects_ledger(&change);
                        dirty |= self.drain_queued();
                        if dirty {
                            self.refresh().await;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Ledger watch lagged, rebuilding");
                        self.drain_queued();
                        self.refresh().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Change feed closed");
                        break;
                    }
                },

                _ = self.shutdown_rx.recv() => {
                    info!("Ledger watch shutting down");
                    break;
                }
            }
        }

        info!("Ledger watch stopped");
    }

    /// Consumes changes already queued. True when any of them matters.
    fn drain_queued(&mut self) -> bool {
        let mut dirty = false;
        loop {
            match self.changes.try_recv() {
                Ok(change) => dirty |= affects_ledger(&change),
                Err(TryRecvError::Lagged(_)) => dirty = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return dirty,
            }
        }
    }

    async fn refresh(&self) {
        match self.reporter.report(self.period_start).await {
            Ok(report) => {
                debug!(
                    entries = report.entry_count,
                    closing = %report.closing_balance,
                    "Ledger view refreshed"
                );
                self.report_tx.send_replace(report);
            }
            Err(e) => warn!(error = %e, "Ledger view refresh failed, keeping last report"),
        }
    }
}

//! Run log: one JSON line per order outcome
//!
//! Records are appended as they happen so a crashed run still leaves a
//! complete account of what was submitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::executor::ExecutionReport;
use crate::domain::{OrderAction, OutcomeKind, ResolvedOrder};
use crate::error::{Result, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub strategy: String,
    pub network: String,
    pub cycle: u64,
    pub order: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<OrderAction>,
    pub outcome: OutcomeKind,
    /// Sessions launched for this order (0 for validation failures)
    pub attempts: u32,
    pub detail: String,
}

/// Outcome counts for the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub confirmed: u32,
    pub rejected: u32,
    pub timed_out: u32,
    pub process_error: u32,
    pub validation_error: u32,
}

impl RunStats {
    fn count(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Confirmed => self.confirmed += 1,
            OutcomeKind::Rejected => self.rejected += 1,
            OutcomeKind::TimedOut => self.timed_out += 1,
            OutcomeKind::ProcessError => self.process_error += 1,
            OutcomeKind::ValidationError => self.validation_error += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.confirmed + self.rejected + self.timed_out + self.process_error + self.validation_error
    }

    pub fn failed(&self) -> u32 {
        self.total() - self.confirmed
    }
}

pub struct RunLog {
    /// JSON-lines file; `None` keeps records in memory only
    path: Option<PathBuf>,
    run_id: Uuid,
    strategy: String,
    network: String,
    stats: RwLock<RunStats>,
}

impl RunLog {
    pub fn new(path: Option<PathBuf>, strategy: &str, network: &str) -> Self {
        Self {
            path,
            run_id: Uuid::new_v4(),
            strategy: strategy.to_string(),
            network: network.to_string(),
            stats: RwLock::new(RunStats::default()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn stats(&self) -> RunStats {
        *self.stats.read().await
    }

    pub async fn record_execution(&self, cycle: u64, order: &ResolvedOrder, report: &ExecutionReport) {
        let record = self.record(
            cycle,
            &order.name,
            Some(order.action),
            report.outcome.kind(),
            report.attempts,
            report.outcome.detail(),
        );
        self.append(record).await;
    }

    pub async fn record_validation(
        &self,
        cycle: u64,
        order: &str,
        action: Option<OrderAction>,
        err: &ValidationError,
    ) {
        let record = self.record(
            cycle,
            order,
            action,
            OutcomeKind::ValidationError,
            0,
            err.to_string(),
        );
        self.append(record).await;
    }

    fn record(
        &self,
        cycle: u64,
        order: &str,
        action: Option<OrderAction>,
        outcome: OutcomeKind,
        attempts: u32,
        detail: String,
    ) -> RunRecord {
        RunRecord {
            timestamp: Utc::now(),
            run_id: self.run_id,
            strategy: self.strategy.clone(),
            network: self.network.clone(),
            cycle,
            order: order.to_string(),
            action,
            outcome,
            attempts,
            detail,
        }
    }

    async fn append(&self, record: RunRecord) {
        self.stats.write().await.count(record.outcome);

        if let Some(path) = &self.path {
            if let Err(e) = write_line(path, &record).await {
                error!("Failed to write run log {}: {}", path.display(), e);
            } else {
                debug!("Run log: {} {}", record.order, record.outcome);
            }
        }
    }

    /// Read every record from a run log file
    pub async fn load(path: &Path) -> Result<Vec<RunRecord>> {
        let content = tokio::fs::read_to_string(path).await?;
        let records = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<RunRecord>)
            .collect::<std::result::Result<Vec<RunRecord>, _>>()?;

        info!("Loaded {} run records from {}", records.len(), path.display());
        Ok(records)
    }
}

async fn write_line(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

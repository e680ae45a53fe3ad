// file: src/models/sync.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible, best-effort status of a group's last reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SyncStatus {
    #[default]
    Unknown,
    InProgress,
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Unknown => "",
            SyncStatus::InProgress => "in_progress",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }

    /// Unrecognised values read back from storage are reported as `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value {
            "in_progress" => SyncStatus::InProgress,
            "success" => SyncStatus::Success,
            "error" => SyncStatus::Error,
            _ => SyncStatus::Unknown,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one group's reconciliation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Skipped,
    Reconciled { deleted: usize, created: usize },
    Failed { kind: &'static str, message: String },
}

impl GroupOutcome {
    pub fn is_reconciled(&self) -> bool {
        matches!(self, GroupOutcome::Reconciled { .. })
    }
}

/// Totals for one `sync_all` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub events_created: usize,
    pub events_deleted: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            synced: 0,
            skipped: 0,
            failed: 0,
            events_created: 0,
            events_deleted: 0,
            started_at,
            finished_at: started_at,
        }
    }

    pub fn record(&mut self, outcome: &GroupOutcome) {
        match outcome {
            GroupOutcome::Skipped => self.skipped += 1,
            GroupOutcome::Reconciled { deleted, created } => {
                self.synced += 1;
                self.events_deleted += deleted;
                self.events_created += created;
            }
            GroupOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn groups(&self) -> usize {
        self.synced + self.skipped + self.failed
    }
}

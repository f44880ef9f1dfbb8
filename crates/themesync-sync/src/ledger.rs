//! Progress counters, per-file results and failure reports
//!
//! Everything in here is shared between the background sync task and the
//! caller holding a [`SyncHandle`](crate::engine::SyncHandle), so all state
//! is lock-free (atomics and `DashMap`).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use themesync_core::domain::{AssetKey, AssetResult, SyncRunId};

// ============================================================================
// Progress
// ============================================================================

/// Snapshot of a job's progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.current, self.total)
    }
}

/// Progress of both jobs of a sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub uploaded: Progress,
    pub deleted: Progress,
}

/// Live progress counter of one job
///
/// `current` never exceeds `total` and never decreases.
#[derive(Debug, Default)]
pub struct JobProgress {
    current: AtomicUsize,
    total: AtomicUsize,
}

impl JobProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of files the job will settle
    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    /// Records `settled` more files as done, clamped to the total
    pub fn advance(&self, settled: usize) {
        let total = self.total.load(Ordering::SeqCst);
        // The closure always returns Some, so the update cannot fail
        let _ = self
            .current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(settled).min(total))
            });
    }

    pub fn snapshot(&self) -> Progress {
        Progress {
            current: self.current.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }
}

// ============================================================================
// SyncLedger
// ============================================================================

/// Outcome counters of a run
#[derive(Debug, Default)]
pub struct OutcomeCounters {
    uploaded: AtomicUsize,
    upload_failures: AtomicUsize,
    deleted: AtomicUsize,
    delete_failures: AtomicUsize,
}

/// Latest result of every file touched by a run
#[derive(Debug, Default)]
pub struct SyncLedger {
    results: DashMap<AssetKey, AssetResult>,
    counters: OutcomeCounters,
}

impl SyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an intermediate result; a later result for the same key replaces it
    pub fn record(&self, result: AssetResult) {
        self.results.insert(result.key.clone(), result);
    }

    /// Records the final outcome of an upload
    pub fn settle_upload(&self, result: &AssetResult) {
        let counter = if result.success {
            &self.counters.uploaded
        } else {
            &self.counters.upload_failures
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Records the outcome of a delete
    pub fn settle_delete(&self, result: AssetResult) {
        let counter = if result.success {
            &self.counters.deleted
        } else {
            &self.counters.delete_failures
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.record(result);
    }

    pub fn get(&self, key: &AssetKey) -> Option<AssetResult> {
        self.results.get(key).map(|entry| entry.value().clone())
    }

    /// All results, ordered by key
    pub fn results(&self) -> BTreeMap<AssetKey, AssetResult> {
        self.results
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Files whose latest result is a failure
    pub fn failures(&self) -> FailureReport {
        let entries = self
            .results()
            .into_values()
            .filter(|result| !result.success)
            .map(|result| FailedFile {
                reasons: result.reasons().to_vec(),
                key: result.key,
            })
            .collect();
        FailureReport { entries }
    }

    pub fn uploaded(&self) -> usize {
        self.counters.uploaded.load(Ordering::SeqCst)
    }

    pub fn upload_failures(&self) -> usize {
        self.counters.upload_failures.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> usize {
        self.counters.deleted.load(Ordering::SeqCst)
    }

    pub fn delete_failures(&self) -> usize {
        self.counters.delete_failures.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Reports
// ============================================================================

/// A file that failed to sync with the reasons reported for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub key: AssetKey,
    pub reasons: Vec<String>,
}

/// Files that failed to sync, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub entries: Vec<FailedFile>,
}

impl FailureReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &AssetKey> {
        self.entries.iter().map(|entry| &entry.key)
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} file(s) failed to sync:", self.entries.len())?;
        for entry in &self.entries {
            if entry.reasons.is_empty() {
                writeln!(f, "  {}", entry.key)?;
            } else {
                writeln!(f, "  {}: {}", entry.key, entry.reasons.join("; "))?;
            }
        }
        Ok(())
    }
}

/// Summary of a finished sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub run_id: SyncRunId,
    /// Files uploaded successfully
    pub uploaded: usize,
    /// Files still failing after all upload attempts
    pub upload_failures: usize,
    /// Remote files deleted
    pub deleted: usize,
    /// Remote deletes that failed
    pub delete_failures: usize,
    pub failures: FailureReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// Wall-clock duration of the run in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

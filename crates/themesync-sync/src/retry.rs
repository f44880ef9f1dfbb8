//! Failed-subset resubmission and delete failure budget
//!
//! ## Uploads
//!
//! A batch is submitted once, then only the files that failed are submitted
//! again, up to `max_upload_retries` more times. Attempts follow each other
//! immediately. A failed bulk call (as opposed to a per-file failure) fails
//! every file of that attempt with the error text.
//!
//! ## Deletes
//!
//! Deletes are not retried. Failures are counted across the whole delete
//! pass; once the count goes past the threshold the pass is aborted.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use themesync_core::config::{RetryConfig, DELETE_FAILURE_THRESHOLD, MAX_UPLOAD_RETRY_COUNT};
use themesync_core::domain::{AssetKey, AssetParam, AssetResult, ThemeId};
use themesync_core::ports::{ILocalFileIndex, IThemeStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batcher::FileBatch;
use crate::ledger::SyncLedger;
use crate::SyncError;

/// Reason recorded for a file the store did not report on
pub const MISSING_RESULT_REASON: &str = "No result returned for this file";

/// Retry limits of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Resubmissions of failed files after the first attempt
    pub max_upload_retries: u32,
    /// Failed deletes tolerated in one delete pass
    pub delete_failure_threshold: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_upload_retries: MAX_UPLOAD_RETRY_COUNT,
            delete_failure_threshold: DELETE_FAILURE_THRESHOLD,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_upload_retries: config.max_upload_retries,
            delete_failure_threshold: config.delete_failure_threshold,
        }
    }
}

// ============================================================================
// Batch uploads
// ============================================================================

/// Uploads batches, resubmitting failed files
pub struct BatchUploader<'a> {
    store: &'a dyn IThemeStore,
    index: &'a dyn ILocalFileIndex,
    ledger: &'a SyncLedger,
    theme_id: ThemeId,
    max_retries: u32,
    cancel: &'a CancellationToken,
}

impl<'a> BatchUploader<'a> {
    pub fn new(
        store: &'a dyn IThemeStore,
        index: &'a dyn ILocalFileIndex,
        ledger: &'a SyncLedger,
        theme_id: ThemeId,
        max_retries: u32,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            store,
            index,
            ledger,
            theme_id,
            max_retries,
            cancel,
        }
    }

    /// Uploads a batch and returns the final result of every file in it
    ///
    /// Files whose content cannot be read are failed without being sent.
    /// Every intermediate result is recorded in the ledger and applied to the
    /// index's upload error map; the final ones are also counted as settled.
    pub async fn upload(&self, batch: &FileBatch) -> Vec<AssetResult> {
        let mut settled: Vec<AssetResult> = Vec::with_capacity(batch.len());
        let mut pending: Vec<AssetParam> = Vec::with_capacity(batch.len());

        for key in batch.keys() {
            match self.index.read_content(key).await {
                Ok(content) => pending.push(AssetParam::new(key.clone(), content)),
                Err(e) => {
                    warn!(key = %key, error = %e, "Local content unavailable, skipping upload");
                    let result = AssetResult::failed(
                        key.clone(),
                        vec![format!("Local content unavailable: {e:#}")],
                    );
                    self.record(&result);
                    settled.push(result);
                }
            }
        }

        let mut attempt: u32 = 0;
        while !pending.is_empty() {
            let results = self.submit(&pending).await;
            for result in &results {
                self.record(result);
            }

            let failed: HashSet<&AssetKey> = results
                .iter()
                .filter(|result| !result.success)
                .map(|result| &result.key)
                .collect();

            let out_of_attempts = attempt >= self.max_retries;
            let cancelled = self.cancel.is_cancelled();
            if failed.is_empty() || out_of_attempts || cancelled {
                if !failed.is_empty() {
                    warn!(
                        failed = failed.len(),
                        attempts = attempt + 1,
                        cancelled,
                        "Files still failing, giving up"
                    );
                }
                settled.extend(results);
                break;
            }

            attempt += 1;
            info!(
                failed = failed.len(),
                attempt,
                max_retries = self.max_retries,
                "Resubmitting failed files"
            );
            pending.retain(|param| failed.contains(&param.key));
            settled.extend(results.into_iter().filter(|result| result.success));
        }

        for result in &settled {
            self.ledger.settle_upload(result);
        }
        settled
    }

    /// One bulk upload call, normalized to exactly one result per submitted file
    async fn submit(&self, pending: &[AssetParam]) -> Vec<AssetResult> {
        debug!(files = pending.len(), "Submitting bulk upload");
        match self.store.bulk_upload(self.theme_id, pending.to_vec()).await {
            Ok(results) => {
                let mut by_key: HashMap<AssetKey, AssetResult> = results
                    .into_iter()
                    .map(|result| (result.key.clone(), result))
                    .collect();
                pending
                    .iter()
                    .map(|param| {
                        by_key.remove(&param.key).unwrap_or_else(|| {
                            AssetResult::failed(
                                param.key.clone(),
                                vec![MISSING_RESULT_REASON.to_string()],
                            )
                        })
                    })
                    .collect()
            }
            Err(e) => {
                warn!(files = pending.len(), error = %e, "Bulk upload call failed");
                let reason = format!("{e:#}");
                pending
                    .iter()
                    .map(|param| AssetResult::failed(param.key.clone(), vec![reason.clone()]))
                    .collect()
            }
        }
    }

    fn record(&self, result: &AssetResult) {
        self.ledger.record(result.clone());
        self.index.sync_state().apply_result(result);
    }
}

// ============================================================================
// Delete failure budget
// ============================================================================

/// Failure count shared by all deletes of a pass
#[derive(Debug)]
pub struct DeleteFailureBudget {
    threshold: usize,
    failures: AtomicUsize,
    exhausted: AtomicBool,
    error: Mutex<Option<SyncError>>,
}

impl DeleteFailureBudget {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            failures: AtomicUsize::new(0),
            exhausted: AtomicBool::new(false),
            error: Mutex::new(None),
        }
    }

    /// Counts a failed delete
    ///
    /// Returns the abort error when this failure takes the count past the
    /// threshold. Only the first such failure returns it.
    pub fn record_failure(&self, reason: &str) -> Option<SyncError> {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures <= self.threshold || self.exhausted.swap(true, Ordering::SeqCst) {
            return None;
        }

        let error = SyncError::DeleteThresholdExceeded {
            failures,
            last_error: reason.to_string(),
        };
        if let Ok(mut slot) = self.error.lock() {
            *slot = Some(error.clone());
        }
        Some(error)
    }

    /// Whether the pass must stop issuing deletes
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    /// Error that aborted the pass, if any
    pub fn abort_error(&self) -> Option<SyncError> {
        self.error.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

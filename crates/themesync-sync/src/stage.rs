//! Stage graph execution for uploads and deletes
//!
//! An [`UploadPlan`] is a list of independent stages plus a sequential list
//! of dependent stages. The independent stages run concurrently with each
//! other and with the dependent pipeline; a dependent stage only starts once
//! the previous one has fully settled. Batches inside a stage run
//! concurrently.
//!
//! A [`DeletePlan`] is a sequential list of stages whose deletes run
//! concurrently within the stage.

use futures_util::future::join_all;
use themesync_core::domain::{AssetKey, AssetResult, Checksum, ChecksumWithSize, ThemeId};
use themesync_core::ports::{ILocalFileIndex, IThemeStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batcher::{create_batches, BatchLimits, FileBatch};
use crate::ledger::{JobProgress, SyncLedger};
use crate::partition::{order_for_delete, order_for_upload, FileCategory, Keyed};
use crate::retry::{BatchUploader, DeleteFailureBudget};
use crate::SyncError;

// ============================================================================
// Plans
// ============================================================================

/// Batches of one file category
#[derive(Debug, Clone)]
pub struct UploadStage {
    pub category: FileCategory,
    pub batches: Vec<FileBatch>,
}

impl UploadStage {
    pub fn file_count(&self) -> usize {
        self.batches.iter().map(FileBatch::len).sum()
    }
}

/// Upload stages of a run
#[derive(Debug, Clone, Default)]
pub struct UploadPlan {
    pub independent: Vec<UploadStage>,
    pub dependent: Vec<UploadStage>,
}

impl UploadPlan {
    /// Orders and batches upload candidates
    ///
    /// Batch sizes come from the local index; unknown files count as empty.
    pub fn build(
        candidates: Vec<Checksum>,
        index: &dyn ILocalFileIndex,
        limits: &BatchLimits,
    ) -> Self {
        let sized = candidates.into_iter().map(|checksum| {
            let size = index.file(&checksum.key).map(|f| f.size).unwrap_or(0);
            ChecksumWithSize::new(checksum, size)
        });

        let order = order_for_upload(sized);
        let stage = |(category, files): (FileCategory, Vec<ChecksumWithSize>)| UploadStage {
            category,
            batches: create_batches(files, limits),
        };

        Self {
            independent: order.independent.into_iter().map(stage).collect(),
            dependent: order.dependent.into_iter().map(stage).collect(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.stages().map(UploadStage::file_count).sum()
    }

    pub fn batch_count(&self) -> usize {
        self.stages().map(|stage| stage.batches.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }

    fn stages(&self) -> impl Iterator<Item = &UploadStage> {
        self.independent.iter().chain(self.dependent.iter())
    }
}

/// Remote files to delete, grouped into sequential stages
#[derive(Debug, Clone, Default)]
pub struct DeletePlan {
    pub stages: Vec<Vec<AssetKey>>,
}

impl DeletePlan {
    pub fn build<T: Keyed>(candidates: impl IntoIterator<Item = T>) -> Self {
        let keys = candidates
            .into_iter()
            .map(|candidate| candidate.asset_key().clone());
        Self {
            stages: order_for_delete(keys),
        }
    }

    pub fn file_count(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Message recorded for a failed delete
pub fn delete_failure_message(key: &AssetKey) -> String {
    format!("Failed to delete file \"{key}\" from remote theme.")
}

// ============================================================================
// StageExecutor
// ============================================================================

/// Runs plans against the theme store
pub struct StageExecutor<'a> {
    store: &'a dyn IThemeStore,
    index: &'a dyn ILocalFileIndex,
    ledger: &'a SyncLedger,
    theme_id: ThemeId,
    cancel: &'a CancellationToken,
}

impl<'a> StageExecutor<'a> {
    pub fn new(
        store: &'a dyn IThemeStore,
        index: &'a dyn ILocalFileIndex,
        ledger: &'a SyncLedger,
        theme_id: ThemeId,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            store,
            index,
            ledger,
            theme_id,
            cancel,
        }
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Uploads every batch of the plan
    ///
    /// Per-file failures are recorded, never returned. The only error is
    /// [`SyncError::Cancelled`], returned once all started batches settled.
    pub async fn run_upload(
        &self,
        plan: &UploadPlan,
        max_retries: u32,
        progress: &JobProgress,
    ) -> Result<(), SyncError> {
        let uploader = BatchUploader::new(
            self.store,
            self.index,
            self.ledger,
            self.theme_id,
            max_retries,
            self.cancel,
        );

        let independent = join_all(
            plan.independent
                .iter()
                .map(|stage| self.run_upload_stage(&uploader, stage, progress)),
        );
        let dependent = async {
            for stage in &plan.dependent {
                self.check_cancelled()?;
                self.run_upload_stage(&uploader, stage, progress).await?;
            }
            Ok::<(), SyncError>(())
        };

        let (independent, dependent) = tokio::join!(independent, dependent);
        independent.into_iter().collect::<Result<(), SyncError>>()?;
        dependent
    }

    async fn run_upload_stage(
        &self,
        uploader: &BatchUploader<'_>,
        stage: &UploadStage,
        progress: &JobProgress,
    ) -> Result<(), SyncError> {
        debug!(
            category = %stage.category,
            files = stage.file_count(),
            batches = stage.batches.len(),
            "Starting upload stage"
        );

        let settled = join_all(
            stage
                .batches
                .iter()
                .map(|batch| self.run_upload_batch(uploader, batch, progress)),
        )
        .await;
        settled.into_iter().collect::<Result<(), SyncError>>()?;

        debug!(category = %stage.category, "Upload stage settled");
        Ok(())
    }

    async fn run_upload_batch(
        &self,
        uploader: &BatchUploader<'_>,
        batch: &FileBatch,
        progress: &JobProgress,
    ) -> Result<(), SyncError> {
        self.check_cancelled()?;

        let results = uploader.upload(batch).await;
        let failed = results.iter().filter(|result| !result.success).count();
        if failed > 0 {
            warn!(files = batch.len(), failed, "Batch settled with failures");
        }

        progress.advance(batch.len());
        for key in batch.keys() {
            self.index.sync_state().mark_settled(key);
        }
        Ok(())
    }

    /// Deletes every file of the plan, stage by stage
    ///
    /// # Errors
    /// Returns [`SyncError::DeleteThresholdExceeded`] when the budget runs
    /// out (deletes already in flight still settle), or
    /// [`SyncError::Cancelled`] when cancellation left deletes unissued.
    /// A pass whose deletes were all issued completes even if cancelled late.
    pub async fn run_delete(
        &self,
        plan: &DeletePlan,
        budget: &DeleteFailureBudget,
        progress: &JobProgress,
    ) -> Result<(), SyncError> {
        for (position, stage) in plan.stages.iter().enumerate() {
            self.check_cancelled()?;
            debug!(stage = position, files = stage.len(), "Starting delete stage");

            let issued =
                join_all(stage.iter().map(|key| self.delete_one(key, budget, progress))).await;

            if let Some(error) = budget.abort_error() {
                warn!(
                    failures = budget.failures(),
                    "Too many failed deletes, aborting delete pass"
                );
                return Err(error);
            }
            if issued.contains(&false) {
                return Err(SyncError::Cancelled);
            }
        }

        info!(files = plan.file_count(), "Delete pass finished");
        Ok(())
    }

    /// Returns whether the delete was issued
    async fn delete_one(
        &self,
        key: &AssetKey,
        budget: &DeleteFailureBudget,
        progress: &JobProgress,
    ) -> bool {
        if budget.is_exhausted() || self.cancel.is_cancelled() {
            return false;
        }

        match self.store.delete_asset(self.theme_id, key).await {
            Ok(()) => {
                debug!(key = %key, "Deleted remote file");
                self.ledger.settle_delete(AssetResult::succeeded(key.clone()));
            }
            Err(e) => {
                let message = delete_failure_message(key);
                warn!(key = %key, error = %e, "{message}");
                self.ledger
                    .settle_delete(AssetResult::failed(key.clone(), vec![message.clone()]));
                budget.record_failure(&message);
            }
        }
        progress.advance(1);
        true
    }
}

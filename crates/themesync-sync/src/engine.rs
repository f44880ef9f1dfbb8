//! Theme synchronization engine
//!
//! The [`ThemeSyncer`] makes a remote theme match a local theme folder.
//!
//! ## Sync Flow
//!
//! 1. **Bootstrap** (caller's task): create missing minimal theme assets
//! 2. **Upload job** (background): wait for the local index, diff against the
//!    reconciled manifest, upload staged batches with per-file retries
//! 3. **Delete job** (background, after uploads settle): delete remote-only
//!    files in reverse dependency order, aborting past the failure threshold
//! 4. **Completion**: the run report or the first fatal error is published on
//!    the [`SyncHandle`]
//!
//! ## Completion Modes
//!
//! By default [`ThemeSyncer::sync`] returns once every job has settled. With
//! `defer_partial_work` it returns right after bootstrap and the caller
//! follows the run through [`SyncHandle::poll_progress`] and
//! [`SyncHandle::await_completion`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use themesync_core::config::{Config, SyncConfig};
use themesync_core::domain::{AssetKey, AssetParam, AssetResult, Checksum, SyncRunId, Theme, ThemeId};
use themesync_core::ports::{ILocalFileIndex, IThemeStore};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::batcher::BatchLimits;
use crate::bootstrap;
use crate::differ;
use crate::ledger::{FailureReport, JobProgress, SyncLedger, SyncProgress, SyncReport};
use crate::retry::{DeleteFailureBudget, RetryPolicy};
use crate::stage::{DeletePlan, StageExecutor, UploadPlan};
use crate::SyncError;

// ============================================================================
// SyncOptions
// ============================================================================

/// Callback receiving the error that ended a run
pub type BackgroundErrorCallback = Arc<dyn Fn(&SyncError) + Send + Sync>;

/// Per-run options of [`ThemeSyncer::sync`]
#[derive(Clone, Default)]
pub struct SyncOptions {
    /// Skip the delete job entirely
    pub no_delete: bool,
    /// Return after bootstrap instead of after every job settled
    pub defer_partial_work: bool,
    /// Invoked with the first fatal error of the run
    pub on_background_error: Option<BackgroundErrorCallback>,
    /// Stops issuing new batches and deletes once cancelled
    pub cancel: CancellationToken,
}

impl SyncOptions {
    /// Options derived from the `sync` configuration section
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            no_delete: config.no_delete,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.defer_partial_work = true;
        self
    }

    #[must_use]
    pub fn without_deletes(mut self) -> Self {
        self.no_delete = true;
        self
    }

    #[must_use]
    pub fn on_background_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&SyncError) + Send + Sync + 'static,
    {
        self.on_background_error = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("no_delete", &self.no_delete)
            .field("defer_partial_work", &self.defer_partial_work)
            .field("on_background_error", &self.on_background_error.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

// ============================================================================
// SyncHandle
// ============================================================================

#[derive(Debug, Clone)]
enum RunState {
    Running,
    Completed(SyncReport),
    Failed(SyncError),
}

impl RunState {
    fn is_settled(&self) -> bool {
        !matches!(self, RunState::Running)
    }
}

/// Caller's view of a sync run
///
/// Cheap to clone; every clone observes the same run.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    run_id: SyncRunId,
    ledger: Arc<SyncLedger>,
    upload_progress: Arc<JobProgress>,
    delete_progress: Arc<JobProgress>,
    state: watch::Receiver<RunState>,
}

impl SyncHandle {
    pub fn run_id(&self) -> SyncRunId {
        self.run_id
    }

    /// Current progress of the upload and delete jobs
    pub fn poll_progress(&self) -> SyncProgress {
        SyncProgress {
            uploaded: self.upload_progress.snapshot(),
            deleted: self.delete_progress.snapshot(),
        }
    }

    /// Latest result of every file touched so far, ordered by key
    pub fn results(&self) -> BTreeMap<AssetKey, AssetResult> {
        self.ledger.results()
    }

    pub fn result(&self, key: &AssetKey) -> Option<AssetResult> {
        self.ledger.get(key)
    }

    /// Files whose latest result is a failure
    pub fn failures(&self) -> FailureReport {
        self.ledger.failures()
    }

    /// Whether the run has completed or failed
    pub fn is_finished(&self) -> bool {
        self.state.borrow().is_settled()
    }

    /// Waits until every job of the run has settled
    ///
    /// # Errors
    /// Returns the first fatal error of the run
    pub async fn await_completion(&self) -> Result<SyncReport, SyncError> {
        let mut state = self.state.clone();
        let outcome = match &*state
            .wait_for(RunState::is_settled)
            .await
            .map_err(|_| SyncError::Background("Sync task stopped without reporting".to_string()))?
        {
            RunState::Completed(report) => Ok(report.clone()),
            RunState::Failed(error) => Err(error.clone()),
            RunState::Running => Err(SyncError::Background(
                "Sync task reported no outcome".to_string(),
            )),
        };
        outcome
    }
}

// ============================================================================
// ThemeSyncer
// ============================================================================

/// Theme synchronization engine
///
/// ## Dependencies
///
/// - `store`: Remote theme storage (bulk upload, delete)
/// - `index`: Local theme files with ignore filtering and sync bookkeeping
/// - `limits`: Bulk upload batch bounds
/// - `retry`: Upload resubmission and delete failure limits
pub struct ThemeSyncer {
    store: Arc<dyn IThemeStore>,
    index: Arc<dyn ILocalFileIndex>,
    limits: BatchLimits,
    retry: RetryPolicy,
}

impl ThemeSyncer {
    /// Creates a new `ThemeSyncer`
    ///
    /// # Arguments
    /// * `store` - Remote theme storage (IThemeStore)
    /// * `index` - Local theme files (ILocalFileIndex)
    /// * `config` - Batching and retry settings
    pub fn new(
        store: Arc<dyn IThemeStore>,
        index: Arc<dyn ILocalFileIndex>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            index,
            limits: BatchLimits::from(&config.batching),
            retry: RetryPolicy::from(&config.retry),
        }
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Synchronizes the local theme into `theme`
    ///
    /// `remote` is the manifest of the remote theme taken before the run.
    ///
    /// # Errors
    /// - [`SyncError::Bootstrap`] if the minimal assets could not be created
    /// - Any fatal error of the run unless `defer_partial_work` is set
    pub async fn sync(
        &self,
        theme: &Theme,
        remote: Vec<Checksum>,
        options: SyncOptions,
    ) -> Result<SyncHandle, SyncError> {
        let run_id = SyncRunId::new();
        let span = info_span!("theme_sync", run_id = %run_id, theme_id = %theme.id);
        let started_at = Utc::now();

        info!(
            parent: &span,
            theme = %theme,
            remote_files = remote.len(),
            no_delete = options.no_delete,
            deferred = options.defer_partial_work,
            "Starting theme sync"
        );

        let created = match bootstrap::ensure_theme_assets(&*self.store, theme.id, &remote)
            .instrument(span.clone())
            .await
        {
            Ok(created) => created,
            Err(e) => {
                error!(parent: &span, error = %e, "Theme bootstrap failed");
                if let Some(callback) = &options.on_background_error {
                    callback(&e);
                }
                return Err(e);
            }
        };

        let ledger = Arc::new(SyncLedger::new());
        let upload_progress = Arc::new(JobProgress::new());
        let delete_progress = Arc::new(JobProgress::new());
        let (state_tx, state_rx) = watch::channel(RunState::Running);

        let run = SyncRun {
            run_id,
            theme_id: theme.id,
            store: Arc::clone(&self.store),
            index: Arc::clone(&self.index),
            ledger: Arc::clone(&ledger),
            upload_progress: Arc::clone(&upload_progress),
            delete_progress: Arc::clone(&delete_progress),
            remote,
            created,
            limits: self.limits,
            retry: self.retry,
            no_delete: options.no_delete,
            cancel: options.cancel.clone(),
            started_at,
        };

        let worker = tokio::spawn(run.execute().instrument(span.clone()));
        let callback = options.on_background_error.clone();
        tokio::spawn(
            async move {
                let outcome = match worker.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(SyncError::Background(e.to_string())),
                };

                let state = match outcome {
                    Ok(report) => {
                        info!(
                            uploaded = report.uploaded,
                            upload_failures = report.upload_failures,
                            deleted = report.deleted,
                            delete_failures = report.delete_failures,
                            duration_ms = report.duration_ms(),
                            "Theme sync completed"
                        );
                        RunState::Completed(report)
                    }
                    Err(e) => {
                        error!(error = %e, "Theme sync failed");
                        if let Some(callback) = &callback {
                            callback(&e);
                        }
                        RunState::Failed(e)
                    }
                };
                state_tx.send_replace(state);
            }
            .instrument(span),
        );

        let handle = SyncHandle {
            run_id,
            ledger,
            upload_progress,
            delete_progress,
            state: state_rx,
        };

        if !options.defer_partial_work {
            handle.await_completion().await?;
        }
        Ok(handle)
    }
}

// ============================================================================
// SyncRun - the background part of a run
// ============================================================================

struct SyncRun {
    run_id: SyncRunId,
    theme_id: ThemeId,
    store: Arc<dyn IThemeStore>,
    index: Arc<dyn ILocalFileIndex>,
    ledger: Arc<SyncLedger>,
    upload_progress: Arc<JobProgress>,
    delete_progress: Arc<JobProgress>,
    /// Remote manifest taken before bootstrap
    remote: Vec<Checksum>,
    /// Minimal assets created by bootstrap
    created: Vec<AssetParam>,
    limits: BatchLimits,
    retry: RetryPolicy,
    no_delete: bool,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

impl SyncRun {
    async fn execute(self) -> Result<SyncReport, SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let executor = StageExecutor::new(
            &*self.store,
            &*self.index,
            &self.ledger,
            self.theme_id,
            &self.cancel,
        );

        self.upload(&executor).await?;

        if self.no_delete {
            debug!("Remote deletion disabled, skipping delete job");
        } else {
            self.delete(&executor).await?;
        }

        Ok(SyncReport {
            run_id: self.run_id,
            uploaded: self.ledger.uploaded(),
            upload_failures: self.ledger.upload_failures(),
            deleted: self.ledger.deleted(),
            delete_failures: self.ledger.delete_failures(),
            failures: self.ledger.failures(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        })
    }

    async fn upload(&self, executor: &StageExecutor<'_>) -> Result<(), SyncError> {
        self.index
            .ready()
            .await
            .map_err(|e| SyncError::IndexNotReady(format!("{e:#}")))?;

        let manifest =
            bootstrap::reconcile_manifest(&self.remote, &self.created, &*self.index).await;
        let candidates = differ::upload_candidates(&manifest, &*self.index);
        self.index
            .sync_state()
            .narrow_dirty(candidates.iter().map(|c| c.key.clone()));

        let plan = UploadPlan::build(candidates, &*self.index, &self.limits);
        self.upload_progress.set_total(plan.file_count());
        info!(
            files = plan.file_count(),
            batches = plan.batch_count(),
            "Uploading theme files"
        );

        executor
            .run_upload(&plan, self.retry.max_upload_retries, &self.upload_progress)
            .await?;

        let failures = self.ledger.failures();
        if !failures.is_empty() {
            warn!(failed = failures.len(), "Some theme files failed to upload");
            for entry in &failures.entries {
                warn!(key = %entry.key, reasons = %entry.reasons.join("; "), "Upload failed");
            }
        }
        Ok(())
    }

    async fn delete(&self, executor: &StageExecutor<'_>) -> Result<(), SyncError> {
        let candidates = differ::delete_candidates(&self.remote, &*self.index);
        let plan = DeletePlan::build(candidates);
        self.delete_progress.set_total(plan.file_count());
        if plan.is_empty() {
            debug!("No remote files to delete");
            return Ok(());
        }

        info!(files = plan.file_count(), "Deleting remote-only files");
        let budget = DeleteFailureBudget::new(self.retry.delete_failure_threshold);
        executor
            .run_delete(&plan, &budget, &self.delete_progress)
            .await
    }
}

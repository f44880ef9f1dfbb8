//! Completion modes, background errors and cancellation

use std::sync::{Arc, Mutex};
use std::time::Duration;

use themesync_core::domain::Checksum;
use themesync_core::ports::ILocalFileIndex;
use themesync_sync::{Progress, SyncError, SyncOptions, SyncProgress};
use tokio_util::sync::CancellationToken;

use crate::common::{self, key, MemoryIndex, RecordingStore};

fn minimal_remote() -> Vec<Checksum> {
    MemoryIndex::new().with_minimal_assets().manifest()
}

#[tokio::test]
async fn test_deferred_sync_returns_before_uploads() {
    let (index, gate) = MemoryIndex::new()
        .with_minimal_assets()
        .text("snippets/a.liquid", "a")
        .binary("assets/b.png", b"b")
        .gated();
    let index = index.into_arc();
    let store = Arc::new(RecordingStore::new().with_remote(&minimal_remote()));

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default().deferred())
        .await
        .unwrap();

    assert!(!handle.is_finished());
    assert_eq!(handle.poll_progress(), SyncProgress::default());
    assert!(store.calls().is_empty());

    gate.send_replace(true);
    let report = handle.await_completion().await.unwrap();

    assert_eq!(report.uploaded, 2);
    assert!(report.is_clean());
    assert_eq!(
        handle.poll_progress().uploaded,
        Progress { current: 2, total: 2 }
    );
    assert!(handle.is_finished());
}

#[tokio::test]
async fn test_background_error_reaches_callback_and_handle() {
    let index = MemoryIndex::new().with_minimal_assets().into_arc();
    let stale = ["snippets/a.liquid", "snippets/b.liquid", "snippets/c.liquid", "snippets/d.liquid"];
    let mut remote = minimal_remote();
    remote.extend(stale.iter().map(|k| Checksum::new(key(k), "stale")));
    let store = stale
        .iter()
        .fold(RecordingStore::new().with_remote(&remote), |store, k| {
            store.fail_delete(k)
        });
    let store = Arc::new(store);

    let reported: Arc<Mutex<Vec<SyncError>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let options = SyncOptions::default()
        .deferred()
        .on_background_error(move |error| sink.lock().unwrap().push(error.clone()));

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), remote, options)
        .await
        .unwrap();
    let err = handle.await_completion().await.unwrap_err();

    assert!(matches!(err, SyncError::DeleteThresholdExceeded { .. }));
    assert_eq!(*reported.lock().unwrap(), vec![err]);
}

#[tokio::test]
async fn test_synchronous_sync_returns_background_error() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .broken("permission denied")
        .into_arc();
    let store = Arc::new(RecordingStore::new().with_remote(&minimal_remote()));

    let err = common::syncer(&store, &index)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err, SyncError::IndexNotReady("permission denied".to_string()));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_run_issues_no_further_work() {
    let (index, gate) = MemoryIndex::new()
        .with_minimal_assets()
        .text("sections/a.liquid", "a")
        .text("templates/index.json", "{}")
        .gated();
    let index = index.into_arc();
    let mut remote = minimal_remote();
    remote.push(Checksum::new(key("snippets/old.liquid"), "stale"));
    let store = Arc::new(RecordingStore::new().with_remote(&remote));
    let cancel = CancellationToken::new();

    let handle = common::syncer(&store, &index)
        .sync(
            &common::theme(),
            remote,
            SyncOptions::default()
                .deferred()
                .with_cancellation(cancel.clone()),
        )
        .await
        .unwrap();

    // Let the run start and wait on the index
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    gate.send_replace(true);

    assert_eq!(handle.await_completion().await.unwrap_err(), SyncError::Cancelled);
    assert!(store.calls().is_empty());
    // Nothing settled, so the selected files stay dirty
    assert_eq!(index.sync_state().dirty_keys().len(), 2);
}

#[tokio::test]
async fn test_handles_observe_the_same_run() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .text("snippets/a.liquid", "a")
        .into_arc();
    let store = Arc::new(RecordingStore::new().with_remote(&minimal_remote()));

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default())
        .await
        .unwrap();
    let other = handle.clone();

    let first = handle.await_completion().await.unwrap();
    let second = other.await_completion().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.run_id, handle.run_id());
    assert_eq!(other.results(), handle.results());
}

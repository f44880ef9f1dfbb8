//! Upload job: diffing, batching, retries and bookkeeping

use std::sync::Arc;

use themesync_core::config::ConfigBuilder;
use themesync_core::domain::Checksum;
use themesync_core::ports::ILocalFileIndex;
use themesync_sync::ignore::IgnoreFilter;
use themesync_sync::{Progress, SyncOptions};

use crate::common::{self, key, MemoryIndex, RecordingStore};

fn minimal_remote() -> Vec<Checksum> {
    MemoryIndex::new().with_minimal_assets().manifest()
}

#[tokio::test]
async fn test_changed_and_new_assets_are_uploaded_together() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .binary("assets/a.png", b"new a")
        .binary("assets/b.png", b"b")
        .into_arc();
    let mut remote = minimal_remote();
    remote.push(Checksum::new(key("assets/a.png"), "stale"));
    let store = Arc::new(RecordingStore::new().with_remote(&remote));

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), remote, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(store.upload_calls(), vec![vec!["assets/a.png", "assets/b.png"]]);
    assert!(store.delete_calls().is_empty());

    let progress = handle.poll_progress();
    assert_eq!(progress.uploaded, Progress { current: 2, total: 2 });
    assert_eq!(progress.deleted, Progress { current: 0, total: 0 });
    assert!(handle.results().values().all(|result| result.success));
    assert!(handle.is_finished());
}

#[tokio::test]
async fn test_changed_file_uploaded_and_remote_only_file_deleted() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .binary("assets/a.png", b"X")
        .into_arc();
    let mut remote = minimal_remote();
    remote.push(Checksum::new(key("assets/a.png"), "Y"));
    remote.push(Checksum::new(key("assets/b.png"), "Z"));
    let store = Arc::new(RecordingStore::new().with_remote(&remote));

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), remote, SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(store.upload_calls(), vec![vec!["assets/a.png"]]);
    assert_eq!(store.delete_calls(), vec!["assets/b.png"]);
    assert!(!store.has_remote("assets/b.png"));
    assert_eq!(handle.poll_progress().deleted, Progress { current: 1, total: 1 });
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .text("sections/header.liquid", "<header></header>")
        .text("templates/index.json", "{\"sections\":{}}")
        .text("locales/en.default.json", "{}")
        .binary("assets/logo.png", &[1, 2, 3])
        .into_arc();
    let mut remote = minimal_remote();
    remote.push(Checksum::new(key("snippets/removed.liquid"), "x"));
    let store = Arc::new(RecordingStore::new().with_remote(&remote));
    let syncer = common::syncer(&store, &index);

    syncer
        .sync(&common::theme(), remote, SyncOptions::default())
        .await
        .unwrap();
    let calls_after_first_run = store.calls().len();
    assert!(calls_after_first_run > 0);

    let handle = syncer
        .sync(&common::theme(), store.manifest(), SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(store.calls().len(), calls_after_first_run);
    assert_eq!(handle.poll_progress().uploaded.total, 0);
    assert_eq!(handle.poll_progress().deleted.total, 0);
}

#[tokio::test]
async fn test_large_category_is_split_into_bounded_batches() {
    let index = (0..25)
        .fold(MemoryIndex::new().with_minimal_assets(), |index, i| {
            index.binary(&format!("assets/{i:02}.png"), &[i as u8])
        })
        .into_arc();
    let store = Arc::new(RecordingStore::new().with_remote(&minimal_remote()));

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default())
        .await
        .unwrap();

    let mut sizes: Vec<usize> = store.upload_calls().iter().map(Vec::len).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![5, 20]);
    assert_eq!(handle.poll_progress().uploaded, Progress { current: 25, total: 25 });
}

#[tokio::test]
async fn test_configured_batch_limits_apply() {
    let index = (0..5)
        .fold(MemoryIndex::new().with_minimal_assets(), |index, i| {
            index.binary(&format!("assets/{i}.png"), &[i as u8])
        })
        .into_arc();
    let store = Arc::new(RecordingStore::new().with_remote(&minimal_remote()));
    let config = ConfigBuilder::new().batching_max_file_count(2).build();

    common::syncer_with(&store, &index, &config)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(store.upload_calls().len(), 3);
}

#[tokio::test]
async fn test_persistent_failure_is_retried_twice_then_reported() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .text("snippets/bad.liquid", "{% if %}")
        .text("snippets/good.liquid", "ok")
        .into_arc();
    let store = Arc::new(
        RecordingStore::new()
            .with_remote(&minimal_remote())
            .fail_upload("snippets/bad.liquid", usize::MAX),
    );

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default())
        .await
        .unwrap();
    let report = handle.await_completion().await.unwrap();

    // Initial attempt plus exactly two resubmissions of the failed file only
    assert_eq!(store.upload_attempts("snippets/bad.liquid"), 3);
    assert_eq!(store.upload_attempts("snippets/good.liquid"), 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.upload_failures, 1);
    let failed: Vec<&str> = report.failures.keys().map(|k| k.as_str()).collect();
    assert_eq!(failed, vec!["snippets/bad.liquid"]);

    let result = handle.result(&key("snippets/bad.liquid")).unwrap();
    assert_eq!(result.reasons(), ["Liquid syntax error"]);
    assert_eq!(
        index.sync_state().upload_error(&key("snippets/bad.liquid")),
        Some(vec!["Liquid syntax error".to_string()])
    );

    // Progress still reaches the total and nothing is left dirty
    assert_eq!(handle.poll_progress().uploaded, Progress { current: 2, total: 2 });
    assert!(index.sync_state().dirty_keys().is_empty());
}

#[tokio::test]
async fn test_transient_failure_recovers_on_retry() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .text("sections/footer.liquid", "<footer></footer>")
        .into_arc();
    let store = Arc::new(
        RecordingStore::new()
            .with_remote(&minimal_remote())
            .fail_upload("sections/footer.liquid", 1),
    );

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(store.upload_attempts("sections/footer.liquid"), 2);
    assert!(handle.result(&key("sections/footer.liquid")).unwrap().success);
    assert!(handle.failures().is_empty());
    assert!(index.sync_state().upload_errors().is_empty());
    assert!(store.has_remote("sections/footer.liquid"));
}

#[tokio::test]
async fn test_failed_call_resubmits_the_whole_batch() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .binary("assets/a.png", b"a")
        .binary("assets/b.png", b"b")
        .into_arc();
    let store = Arc::new(
        RecordingStore::new()
            .with_remote(&minimal_remote())
            .fail_upload_calls(1),
    );

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(
        store.upload_calls(),
        vec![
            vec!["assets/a.png", "assets/b.png"],
            vec!["assets/a.png", "assets/b.png"],
        ]
    );
    assert!(handle.failures().is_empty());
}

#[tokio::test]
async fn test_unreadable_file_is_reported_without_being_sent() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .unreadable("snippets/broken.liquid")
        .text("snippets/fine.liquid", "fine")
        .into_arc();
    let store = Arc::new(RecordingStore::new().with_remote(&minimal_remote()));

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(store.upload_calls(), vec![vec!["snippets/fine.liquid"]]);
    let result = handle.result(&key("snippets/broken.liquid")).unwrap();
    assert!(!result.success);
    assert!(result.reasons()[0].starts_with("Local content unavailable"));
    assert_eq!(handle.poll_progress().uploaded, Progress { current: 2, total: 2 });
}

#[tokio::test]
async fn test_ignored_files_are_left_alone() {
    let filter = IgnoreFilter::new(
        ["config/settings_data.json", "assets/legacy.js"],
        Vec::<String>::new(),
    );
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .text("config/settings_data.json", "{\"current\":\"local\"}")
        .with_filter(filter)
        .into_arc();
    let mut remote = minimal_remote();
    remote.push(Checksum::new(key("config/settings_data.json"), "remote"));
    remote.push(Checksum::new(key("assets/legacy.js"), "remote"));
    let store = Arc::new(RecordingStore::new().with_remote(&remote));

    common::syncer(&store, &index)
        .sync(&common::theme(), remote, SyncOptions::default())
        .await
        .unwrap();

    assert!(store.calls().is_empty());
    assert!(store.has_remote("assets/legacy.js"));
}

#[tokio::test]
async fn test_dirty_set_tracks_selected_files_until_settled() {
    let index = MemoryIndex::new()
        .with_minimal_assets()
        .text("snippets/a.liquid", "a")
        .into_arc();
    index.sync_state().mark_dirty(key("snippets/unrelated.liquid"));
    let store = Arc::new(RecordingStore::new().with_remote(&minimal_remote()));

    common::syncer(&store, &index)
        .sync(&common::theme(), minimal_remote(), SyncOptions::default())
        .await
        .unwrap();

    // The unrelated key was dropped when the selection replaced the set
    assert!(!index.sync_state().is_dirty(&key("snippets/unrelated.liquid")));
    assert!(index.sync_state().dirty_keys().is_empty());
}

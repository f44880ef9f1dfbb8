//! End-to-end runs against a theme folder on disk

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use themesync_core::config::{Config, ConfigBuilder};
use themesync_core::domain::Checksum;
use themesync_core::ports::{ILocalFileIndex, IThemeStore};
use themesync_sync::filesystem::FileSystemIndex;
use themesync_sync::ignore::IgnoreFilter;
use themesync_sync::{SyncOptions, ThemeSyncer};

use crate::common::{self, key, RecordingStore};

fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn theme_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "config/settings_schema.json", b"[]");
    write(
        root,
        "layout/theme.liquid",
        b"<html>{{ content_for_header }}{{ content_for_layout }}</html>",
    );
    write(
        root,
        "layout/password.liquid",
        b"{{ content_for_header }}{{ content_for_layout }}",
    );
    write(root, "sections/header.liquid", b"<header>{{ shop.name }}</header>");
    write(root, "templates/index.json", b"{\"sections\":{},\"order\":[]}");
    write(root, "locales/en.default.json", b"{\"general\":{}}");
    write(root, "assets/logo.png", &[0x89, b'P', b'N', b'G', 0, 1, 2, 3]);
    dir
}

fn syncer(store: &Arc<RecordingStore>, index: &Arc<FileSystemIndex>, config: &Config) -> ThemeSyncer {
    ThemeSyncer::new(
        Arc::clone(store) as Arc<dyn IThemeStore>,
        Arc::clone(index) as Arc<dyn ILocalFileIndex>,
        config,
    )
}

#[tokio::test]
async fn test_theme_folder_round_trip_is_idempotent() {
    let dir = theme_dir();
    let index = FileSystemIndex::spawn(dir.path(), IgnoreFilter::default());
    let store = Arc::new(RecordingStore::new());
    let syncer = syncer(&store, &index, &Config::default());

    let first = syncer
        .sync(&common::theme(), Vec::new(), SyncOptions::default())
        .await
        .unwrap()
        .await_completion()
        .await
        .unwrap();
    assert!(first.is_clean());

    // Every local file now exists remotely with the same checksum
    let local: Vec<Checksum> = index.checksums();
    assert_eq!(store.manifest(), local);

    let calls = store.calls().len();
    let second = syncer
        .sync(&common::theme(), store.manifest(), SyncOptions::default())
        .await
        .unwrap()
        .await_completion()
        .await
        .unwrap();

    assert_eq!(store.calls().len(), calls);
    assert_eq!(second.uploaded, 0);
    assert_eq!(second.deleted, 0);
}

#[tokio::test]
async fn test_local_edit_and_removal_are_pushed() {
    let dir = theme_dir();
    let store = Arc::new(RecordingStore::new());
    {
        let index = FileSystemIndex::spawn(dir.path(), IgnoreFilter::default());
        syncer(&store, &index, &Config::default())
            .sync(&common::theme(), Vec::new(), SyncOptions::default())
            .await
            .unwrap();
    }
    let before = store.calls().len();

    write(dir.path(), "sections/header.liquid", b"<header>edited</header>");
    std::fs::remove_file(dir.path().join("locales/en.default.json")).unwrap();

    let index = FileSystemIndex::spawn(dir.path(), IgnoreFilter::default());
    let report = syncer(&store, &index, &Config::default())
        .sync(&common::theme(), store.manifest(), SyncOptions::default())
        .await
        .unwrap()
        .await_completion()
        .await
        .unwrap();

    assert_eq!(store.calls().len() - before, 2);
    assert_eq!(
        store.upload_calls().last().unwrap(),
        &vec!["sections/header.liquid".to_string()]
    );
    assert_eq!(store.delete_calls(), vec!["locales/en.default.json"]);
    assert_eq!((report.uploaded, report.deleted), (1, 1));
}

#[tokio::test]
async fn test_ignore_file_and_config_patterns() {
    let dir = theme_dir();
    write(dir.path(), ".themeignore", b"# local only\nlocales/\n");
    let config = ConfigBuilder::new()
        .sync_root(dir.path().to_path_buf())
        .sync_ignore("assets/*.png")
        .build();

    let index = FileSystemIndex::from_config(&config.sync).await.unwrap();
    let remote = vec![Checksum::new(key("locales/fr.json"), "remote")];
    let store = Arc::new(RecordingStore::new().with_remote(&remote));

    syncer(&store, &index, &config)
        .sync(&common::theme(), remote, SyncOptions::from_config(&config.sync))
        .await
        .unwrap();

    assert!(!store.has_remote("assets/logo.png"));
    assert!(!store.has_remote("locales/en.default.json"));
    assert!(store.has_remote("locales/fr.json"));
    assert!(store.has_remote("sections/header.liquid"));
}

#[tokio::test]
async fn test_missing_root_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let index = FileSystemIndex::spawn(dir.path().join("missing"), IgnoreFilter::default());
    let store = Arc::new(RecordingStore::new().with_remote(
        &themesync_sync::bootstrap::MINIMUM_THEME_ASSETS
            .iter()
            .map(|(k, _)| Checksum::new(key(k), "x"))
            .collect::<Vec<_>>(),
    ));

    let err = syncer(&store, &index, &Config::default())
        .sync(&common::theme(), store.manifest(), SyncOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, themesync_sync::SyncError::IndexNotReady(_)));
}

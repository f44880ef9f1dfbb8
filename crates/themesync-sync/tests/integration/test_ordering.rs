//! Dependency ordering of upload and delete stages
//!
//! The store stamps every call with logical clock ticks when it starts and
//! when it finishes. A stage that must follow another may only start after
//! every call of the earlier stage has finished.

use std::sync::Arc;
use std::time::Duration;

use themesync_core::domain::Checksum;
use themesync_sync::SyncOptions;

use crate::common::{self, key, MemoryIndex, RecordingStore, StoreCall};

const LATENCY: Duration = Duration::from_millis(10);

/// Start and finish ticks of the upload call carrying `key`
fn upload_span(calls: &[StoreCall], key: &str) -> (usize, usize) {
    calls
        .iter()
        .find_map(|call| match call {
            StoreCall::Upload {
                keys,
                started,
                finished,
            } if keys.iter().any(|k| k == key) => Some((*started, *finished)),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no upload call for {key}"))
}

fn delete_span(calls: &[StoreCall], key: &str) -> (usize, usize) {
    calls
        .iter()
        .find_map(|call| match call {
            StoreCall::Delete {
                key: deleted,
                started,
                finished,
                ..
            } if deleted == key => Some((*started, *finished)),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no delete call for {key}"))
}

fn assert_chain(spans: &[(&str, (usize, usize))]) {
    for pair in spans.windows(2) {
        let (earlier, (_, earlier_finished)) = pair[0];
        let (later, (later_started, _)) = pair[1];
        assert!(
            earlier_finished < later_started,
            "{later} started before {earlier} finished"
        );
    }
}

#[tokio::test]
async fn test_dependent_uploads_run_in_dependency_order() {
    let index = MemoryIndex::new()
        .text("layout/password.liquid", "{{ content_for_header }}{{ content_for_layout }}")
        .text("layout/theme.liquid", "{{ content_for_header }}{{ content_for_layout }}")
        .text("config/settings_schema.json", "[{\"name\":\"theme_info\"}]")
        .text("config/settings_data.json", "{\"current\":{}}")
        .text("templates/index.context.b2b.json", "{}")
        .text("templates/index.json", "{}")
        .text("sections/header-group.json", "{}")
        .text("sections/header.liquid", "<header></header>")
        .text("blocks/slide.liquid", "<div></div>")
        .binary("assets/app.js", b"console.log(1)")
        .text("snippets/icon.liquid", "<svg></svg>")
        .into_arc();
    let remote: Vec<Checksum> = MemoryIndex::new().with_minimal_assets().manifest();
    let store = Arc::new(
        RecordingStore::new()
            .with_remote(&remote)
            .with_latency(LATENCY),
    );

    common::syncer(&store, &index)
        .sync(&common::theme(), remote, SyncOptions::default())
        .await
        .unwrap();

    let calls = store.calls();
    let dependent = [
        "blocks/slide.liquid",
        "sections/header.liquid",
        "sections/header-group.json",
        "templates/index.json",
        "templates/index.context.b2b.json",
        "config/settings_schema.json",
        "config/settings_data.json",
    ];
    let spans: Vec<(&str, (usize, usize))> = dependent
        .iter()
        .map(|k| (*k, upload_span(&calls, k)))
        .collect();
    assert_chain(&spans);

    // Independent categories overlap with the start of the dependent pipeline
    let (_, first_dependent_finished) = upload_span(&calls, "blocks/slide.liquid");
    for independent in ["assets/app.js", "snippets/icon.liquid"] {
        let (started, _) = upload_span(&calls, independent);
        assert!(started < first_dependent_finished, "{independent} waited on dependents");
    }
}

#[tokio::test]
async fn test_deletes_run_in_reverse_dependency_order() {
    let index = MemoryIndex::new().with_minimal_assets().into_arc();
    let mut remote = index.manifest();
    for stale in [
        "assets/old.png",
        "config/settings_data.json",
        "snippets/old.liquid",
        "sections/old.liquid",
        "templates/old.json",
        "locales/old.json",
        "templates/old.context.b2b.json",
    ] {
        remote.push(Checksum::new(key(stale), "stale"));
    }
    let store = Arc::new(
        RecordingStore::new()
            .with_remote(&remote)
            .with_latency(LATENCY),
    );

    let handle = common::syncer(&store, &index)
        .sync(&common::theme(), remote, SyncOptions::default())
        .await
        .unwrap();

    let calls = store.calls();
    let stages: Vec<Vec<&str>> = vec![
        vec!["templates/old.context.b2b.json"],
        vec!["templates/old.json", "locales/old.json"],
        vec!["sections/old.liquid", "snippets/old.liquid"],
        vec!["config/settings_data.json"],
        vec!["assets/old.png"],
    ];

    for pair in stages.windows(2) {
        let earlier_finished = pair[0]
            .iter()
            .map(|k| delete_span(&calls, k).1)
            .max()
            .unwrap();
        let later_started = pair[1]
            .iter()
            .map(|k| delete_span(&calls, k).0)
            .min()
            .unwrap();
        assert!(earlier_finished < later_started, "{:?} overlapped {:?}", pair[1], pair[0]);
    }

    // Files of one stage are deleted concurrently
    let (json_a, json_b) = (
        delete_span(&calls, "templates/old.json"),
        delete_span(&calls, "locales/old.json"),
    );
    assert!(json_a.0 < json_b.1 && json_b.0 < json_a.1);

    assert_eq!(handle.poll_progress().deleted.current, 7);
    assert!(handle.failures().is_empty());
}

//! Publishing, batch uploads and deletion.

use super::TestHarness;
use busker::error::{Error, TransferErrorKind};
use busker::media::{MediaCategory, MediaDraft};
use busker::upload::{ClosureObserver, UploadState};
use busker::ClientEvent;
use parking_lot::Mutex;
use std::sync::Arc;

/// A published item shows up in every list it belongs to.
#[tokio::test]
async fn test_publish_appears_in_lists() {
    let harness = TestHarness::setup();
    harness.onboard("Ada", false).await;

    // Prime every list while it is still empty.
    assert!(harness.client.all_media().await.unwrap().is_empty());
    assert!(harness
        .client
        .artist_media(&harness.artist())
        .await
        .unwrap()
        .is_empty());
    assert!(harness
        .client
        .category_media(MediaCategory::Recording)
        .await
        .unwrap()
        .is_empty());

    let media_id = harness.publish("First Song").await;

    let all = harness.client.all_media().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, media_id);
    assert_eq!(all[0].title, "First Song");

    let mine = harness.client.artist_media(&harness.artist()).await.unwrap();
    assert_eq!(mine.len(), 1);

    let recordings = harness
        .client
        .category_media(MediaCategory::Recording)
        .await
        .unwrap();
    assert_eq!(recordings.len(), 1);
    assert!(harness
        .client
        .category_media(MediaCategory::Video)
        .await
        .unwrap()
        .is_empty());

    assert_eq!(harness.client.stats().media_published, 1);
}

/// Progress seen by the caller only moves forward and ends at 100.
#[tokio::test]
async fn test_publish_progress_is_monotonic() {
    let harness = TestHarness::setup();
    harness.backend.script_progress(vec![10, 40, 30, 80, 100]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = {
        let seen = Arc::clone(&seen);
        Arc::new(ClosureObserver(move |percent: u8| seen.lock().push(percent)))
    };
    let draft = MediaDraft::from_file("take.mp3", vec![1u8; 4096]);
    harness.client.publish_media(draft, observer).await.unwrap();

    let seen = seen.lock().clone();
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "not monotonic: {seen:?}");
    assert_eq!(seen.last(), Some(&100));
    assert_eq!(seen.iter().filter(|p| **p == 100).count(), 1);
}

/// A failed upload publishes nothing.
#[tokio::test]
async fn test_failed_upload_publishes_nothing() {
    let harness = TestHarness::setup();
    harness.backend.fail_next_upload(TransferErrorKind::Network);

    let draft = MediaDraft::from_file("lost.mp3", vec![1u8; 1024]);
    let result = harness
        .client
        .publish_media(draft, Arc::new(busker::upload::NoopObserver))
        .await;

    assert!(matches!(
        result,
        Err(Error::Transfer(TransferErrorKind::Network, _))
    ));
    assert!(harness.client.all_media().await.unwrap().is_empty());
    assert_eq!(harness.client.stats().media_published, 0);
}

/// Batch publishing uploads concurrently and keeps results in input order.
#[tokio::test]
async fn test_publish_batch_keeps_order() {
    let harness = TestHarness::setup();
    let mut events = harness.client.subscribe();

    let drafts = vec![
        MediaDraft::from_file("one.mp3", vec![1u8; 512]),
        MediaDraft::from_file("two.mp3", Vec::<u8>::new()),
        MediaDraft::from_file("three.mp4", vec![3u8; 1024]).with_category(MediaCategory::Video),
    ];
    let results = harness.client.publish_batch(drafts).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::Validation(_))));
    assert!(results[2].is_ok());

    let all = harness.client.all_media().await.unwrap();
    let titles: Vec<_> = all.iter().map(|m| m.title.as_str()).collect();
    assert!(titles.contains(&"one"));
    assert!(titles.contains(&"three"));
    assert_eq!(all.len(), 2);

    // Each upload reported its own progress.
    let mut progressed = std::collections::BTreeSet::new();
    let mut published = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::UploadProgress { task_id, .. } => {
                progressed.insert(task_id);
            }
            ClientEvent::MediaPublished { .. } => published += 1,
            _ => {}
        }
    }
    assert_eq!(progressed.len(), 2);
    assert_eq!(published, 2);

    let tasks = harness.client.uploads().registry().snapshot();
    assert_eq!(tasks.len(), 2);
    assert!(tasks
        .iter()
        .all(|t| matches!(t.state, UploadState::Succeeded(_))));
}

/// Deleting drops the item from lists that were cached before.
#[tokio::test]
async fn test_delete_refreshes_cached_lists() {
    let harness = TestHarness::setup();
    let keep = harness.publish("Keep").await;
    let gone = harness.publish("Gone").await;

    // Prime.
    assert_eq!(
        harness
            .client
            .artist_media(&harness.artist())
            .await
            .unwrap()
            .len(),
        2
    );
    assert!(harness.client.media_card(&gone).await.unwrap().is_some());

    harness.client.delete_media(&gone).await.unwrap();

    let mine = harness.client.artist_media(&harness.artist()).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, keep);
    assert!(harness.client.media_card(&gone).await.unwrap().is_none());
    assert_eq!(harness.client.stats().media_deleted, 1);
}

/// Publishing needs an identity.
#[tokio::test]
async fn test_publish_without_identity_rejected() {
    let harness = TestHarness::setup();
    let client = busker::BuskerClient::with_defaults()
        .with_backend(Arc::new(harness.backend.clone()));

    let draft = MediaDraft::from_file("anon.mp3", vec![1u8; 64]);
    let result = client
        .publish_media(draft, Arc::new(busker::upload::NoopObserver))
        .await;

    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(harness.backend.blob_count(), 0);
}

/// Media stored from a remote URL is tracked and publishable.
#[tokio::test]
async fn test_publish_from_url() {
    let harness = TestHarness::setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = {
        let seen = Arc::clone(&seen);
        Arc::new(ClosureObserver(move |percent: u8| seen.lock().push(percent)))
    };

    let media_id = harness
        .client
        .publish_from_url(
            "https://cdn.example.com/set.mp3",
            MediaDraft::from_file("set.mp3", Vec::<u8>::new()),
            observer,
        )
        .await
        .unwrap();

    let all = harness.client.all_media().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, media_id);
    assert_eq!(all[0].title, "set");
    assert_eq!(seen.lock().last(), Some(&100));

    let tasks = harness.client.uploads().registry().snapshot();
    assert_eq!(tasks.len(), 1);
    assert!(matches!(tasks[0].state, UploadState::Succeeded(_)));
}

//! Cached reads after mutations.

use super::TestHarness;
use busker::backend::MediaItem;
use busker::cache::{Mutation, QueryKey};
use busker::ClientEvent;
use std::sync::Arc;

/// Repeated reads are served from cache until a mutation drops them.
#[tokio::test]
async fn test_reads_cached_until_mutation() {
    let harness = TestHarness::setup();
    harness.publish("Cached").await;

    harness.client.all_media().await.unwrap();
    let calls = harness.backend.call_count();
    harness.client.all_media().await.unwrap();
    assert_eq!(harness.backend.call_count(), calls);
    assert!(harness.client.cache_stats().hits >= 1);

    harness.publish("Fresh").await;
    let all = harness.client.all_media().await.unwrap();
    assert_eq!(all.len(), 2);
}

/// Subscribers hear about publications and the reads they invalidated.
#[tokio::test]
async fn test_mutation_events_reach_subscribers() {
    let harness = TestHarness::setup();
    harness.client.all_media().await.unwrap();
    let mut events = harness.client.subscribe();

    let media_id = harness.publish("Loud").await;

    let mut published = None;
    let mut invalidated = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::MediaPublished { media_id } => published = Some(media_id),
            ClientEvent::CacheInvalidated { keys } => invalidated.extend(keys),
            _ => {}
        }
    }
    assert_eq!(published.as_deref(), Some(media_id.as_str()));
    assert!(invalidated.contains(&QueryKey::AllMedia));
}

/// A read that was in flight across an invalidation is not written back.
#[tokio::test]
async fn test_in_flight_read_not_cached_after_invalidation() {
    let harness = TestHarness::setup();
    let cache = harness.client.cache().clone();

    let stale: Vec<MediaItem> = cache
        .read_through(QueryKey::AllMedia, || async {
            cache.invalidate(&Mutation::PublishMedia);
            Ok(Vec::new())
        })
        .await
        .unwrap();

    assert!(stale.is_empty());
    assert!(cache.store().peek(&QueryKey::AllMedia).is_none());
    assert_eq!(cache.stats().stale_writes, 1);
}

/// Profile edits are visible on the next read.
#[tokio::test]
async fn test_profile_update_visible() {
    let harness = TestHarness::setup();
    harness.onboard("Ada", false).await;

    let before = harness.client.current_artist().await.unwrap().unwrap();
    assert_eq!(before.display_name, "Ada");

    harness
        .client
        .update_profile(busker::client::ProfileDraft::named("Ada Loud").with_bio("synths"))
        .await
        .unwrap();

    let after = harness.client.current_artist().await.unwrap().unwrap();
    assert_eq!(after.display_name, "Ada Loud");
    assert_eq!(after.bio, "synths");
    let public = harness
        .client
        .artist(&harness.artist())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(public.display_name, "Ada Loud");
}

/// An avatar survives a profile edit that does not replace it.
#[tokio::test]
async fn test_profile_update_keeps_avatar() {
    let harness = TestHarness::setup();
    harness
        .client
        .onboard_artist(busker::client::ProfileDraft::named("Ada").with_avatar(vec![9u8; 128]))
        .await
        .unwrap();
    let avatar = harness
        .client
        .current_artist()
        .await
        .unwrap()
        .unwrap()
        .avatar
        .unwrap();

    harness
        .client
        .update_profile(busker::client::ProfileDraft::named("Ada"))
        .await
        .unwrap();

    let profile = harness.client.current_artist().await.unwrap().unwrap();
    assert_eq!(profile.avatar, Some(avatar));
}

/// Nothing works without a backend, and reconnecting restores service.
#[tokio::test]
async fn test_disconnected_client_reports_unavailable() {
    let harness = TestHarness::setup();
    harness.client.disconnect();

    let result = harness.client.all_media().await;
    assert!(matches!(result, Err(busker::Error::BackendUnavailable)));
    let notice = harness
        .client
        .report(&busker::Error::BackendUnavailable);
    assert!(notice.is_error());

    harness.client.connect(Arc::new(harness.backend.clone()));
    assert!(harness.client.all_media().await.unwrap().is_empty());
}

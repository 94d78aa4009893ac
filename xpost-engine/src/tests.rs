use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use xpost_common::Metrics;
use xpost_core::{Media, MediaSource, PlatformConfig, PlatformRegistry, PlatformType, Post, PostRepository, Visibility};
use xpost_testing::{InMemoryLock, InMemoryPostRepository, ScriptedPlatformClient};

use super::*;

fn cfg(name: &str, platform_type: PlatformType, sync_from: &[&str]) -> PlatformConfig {
    PlatformConfig {
        name: name.to_string(),
        platform_type,
        enabled: true,
        sync_enabled: true,
        sync_from: sync_from.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        credential: None,
    }
}

struct Harness {
    engine: SyncEngine,
    repository: Arc<InMemoryPostRepository>,
    primary: Arc<ScriptedPlatformClient>,
    mastodon: Arc<ScriptedPlatformClient>,
    bluesky: Arc<ScriptedPlatformClient>,
}

fn harness() -> Harness {
    let primary = Arc::new(ScriptedPlatformClient::new("memos-main", PlatformType::Memos));
    let mastodon = Arc::new(ScriptedPlatformClient::new("mastodon-a", PlatformType::Mastodon));
    let bluesky = Arc::new(ScriptedPlatformClient::new("bluesky-a", PlatformType::Bluesky));

    let mut registry = PlatformRegistry::new("memos-main");
    registry.register(cfg("memos-main", PlatformType::Memos, &["*"]), primary.clone());
    registry.register(cfg("mastodon-a", PlatformType::Mastodon, &["memos-main"]), mastodon.clone());
    registry.register(cfg("bluesky-a", PlatformType::Bluesky, &["memos-main"]), bluesky.clone());

    let repository = Arc::new(InMemoryPostRepository::new());
    let lock = Arc::new(InMemoryLock::new());

    let engine = SyncEngine::new(
        Arc::new(registry),
        repository.clone(),
        lock,
        Metrics::noop(),
        SyncEngineConfig::default(),
    );

    Harness {
        engine,
        repository,
        primary,
        mastodon,
        bluesky,
    }
}

fn post(id: &str, visibility: Visibility, age: Duration) -> Post {
    Post::from_source(
        "memos-main",
        id,
        format!("content-{id}"),
        visibility,
        vec![Media {
            description: None,
            source: MediaSource::Url { url: "https://example.test/a.png".into() },
        }],
        Utc::now() - chrono::Duration::from_std(age).unwrap(),
    )
}

// Scenario 1 (spec.md §8): fresh public post fans out to every eligible target.
#[tokio::test]
async fn fresh_public_post_fans_out_to_all_eligible_targets() {
    let h = harness();
    h.primary.push_list_posts(Ok(vec![post("p1", Visibility::Public, Duration::from_secs(60))]));

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.checked, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.cross_post_success.get("mastodon-a"), Some(&1));
    assert_eq!(report.cross_post_success.get("bluesky-a"), Some(&1));
    assert_eq!(h.mastodon.post_call_count(), 1);
    assert_eq!(h.bluesky.post_call_count(), 1);
}

// Scenario 2: unlisted post is skipped for bluesky (unsupported) but still
// reaches mastodon, which supports every visibility.
#[tokio::test]
async fn unlisted_post_skips_unsupported_target_only() {
    let h = harness();
    h.primary.push_list_posts(Ok(vec![post("p1", Visibility::Unlisted, Duration::from_secs(60))]));

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.cross_post_success.get("mastodon-a"), Some(&1));
    assert!(report.cross_post_success.get("bluesky-a").is_none());
    assert_eq!(h.bluesky.post_call_count(), 0);
}

// Scenario 3 (P2): a private post is never forwarded to any target.
#[tokio::test]
async fn private_post_is_never_cross_posted() {
    let h = harness();
    h.primary.push_list_posts(Ok(vec![post("p1", Visibility::Private, Duration::from_secs(60))]));

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.skipped_private, 1);
    assert_eq!(report.processed, 0);
    assert_eq!(h.mastodon.post_call_count(), 0);
    assert_eq!(h.bluesky.post_call_count(), 0);
}

// Posts older than max_age are skipped without touching storage.
#[tokio::test]
async fn stale_post_is_skipped_old() {
    let h = harness();
    h.primary.push_list_posts(Ok(vec![post("p1", Visibility::Public, Duration::from_secs(7200))]));

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.skipped_old, 1);
    assert_eq!(report.processed, 0);
    assert!(h
        .repository
        .get_by_source("memos-main", "p1")
        .await
        .unwrap()
        .is_none());
}

// P1: running sync twice on the same feed never double-creates a StoredPost,
// and the second pass reports it as `exists`.
#[tokio::test]
async fn rerunning_sync_on_same_post_reports_exists_not_processed() {
    let h = harness();
    let p = post("p1", Visibility::Public, Duration::from_secs(60));
    h.primary.push_list_posts(Ok(vec![p.clone()]));
    h.primary.push_list_posts(Ok(vec![p]));

    let first = h.engine.sync().await.unwrap();
    assert_eq!(first.processed, 1);
    assert_eq!(first.exists, 0);

    let second = h.engine.sync().await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.exists, 1);
}

// I2 / P6: once a target has a successful outcome recorded, re-running sync
// (e.g. after a later manual retry) must not re-post to that target.
#[tokio::test]
async fn target_already_cross_posted_is_not_retried() {
    let h = harness();
    let p = post("p1", Visibility::Public, Duration::from_secs(60));
    h.primary.push_list_posts(Ok(vec![p.clone()]));
    h.primary.push_list_posts(Ok(vec![p]));

    h.engine.sync().await.unwrap();
    assert_eq!(h.mastodon.post_call_count(), 1);

    h.engine.sync().await.unwrap();
    assert_eq!(h.mastodon.post_call_count(), 1, "already-done target must not be retried");
}

// P5: one target's failure doesn't prevent the other target from succeeding,
// and the failure is recorded rather than aborting the whole post.
#[tokio::test]
async fn one_target_failure_does_not_block_the_other() {
    let h = harness();
    h.bluesky.push_post_result(Err(XpostError::platform("bluesky-a", "rate limited")));
    h.primary.push_list_posts(Ok(vec![post("p1", Visibility::Public, Duration::from_secs(60))]));

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.cross_post_success.get("mastodon-a"), Some(&1));
    assert_eq!(report.cross_post_error.get("bluesky-a"), Some(&1));
}

// P4 / scenario 5: a second concurrent sync on the same primary is a no-op
// while the first holds the lock.
#[tokio::test]
async fn concurrent_sync_on_held_lock_is_a_no_op() {
    let lock = InMemoryLock::new();
    let _guard = lock.acquire("sync:memos-main", Duration::from_secs(60)).await.unwrap();

    let mut registry = PlatformRegistry::new("memos-main");
    let primary = Arc::new(ScriptedPlatformClient::new("memos-main", PlatformType::Memos));
    registry.register(cfg("memos-main", PlatformType::Memos, &["*"]), primary);

    let engine = SyncEngine::new(
        Arc::new(registry),
        Arc::new(InMemoryPostRepository::new()),
        Arc::new(lock),
        Metrics::noop(),
        SyncEngineConfig::default(),
    );

    let report = engine.sync().await.unwrap();
    assert!(report.no_op);
    assert_eq!(report.checked, 0);
}

// Posts with an empty id are counted and skipped rather than propagating a panic.
#[tokio::test]
async fn post_with_empty_id_is_counted_as_errored() {
    let h = harness();
    let mut bad = post("p1", Visibility::Public, Duration::from_secs(60));
    bad.id = String::new();
    h.primary.push_list_posts(Ok(vec![bad]));

    let report = h.engine.sync().await.unwrap();
    assert_eq!(report.errored_posts, 1);
    assert_eq!(report.processed, 0);
}

// Primary fetch failures propagate rather than being absorbed into the report.
#[tokio::test]
async fn primary_fetch_failure_propagates() {
    let h = harness();
    h.primary
        .push_list_posts(Err(XpostError::platform("memos-main", "503")));

    let result = h.engine.sync().await;
    assert!(result.is_err());
}

// A `Schedule(...)`-style targets override restricts fan-out to the named
// subset, leaving the other eligible target untouched (spec.md §4.6).
#[tokio::test]
async fn targets_override_restricts_fan_out() {
    let h = harness();
    h.primary.push_list_posts(Ok(vec![post("p1", Visibility::Public, Duration::from_secs(60))]));

    let report = h
        .engine
        .sync_with_overrides(Some(&["mastodon-a".to_string()]), None)
        .await
        .unwrap();

    assert_eq!(report.cross_post_success.get("mastodon-a"), Some(&1));
    assert!(report.cross_post_success.get("bluesky-a").is_none());
    assert_eq!(h.bluesky.post_call_count(), 0);
}

// A `max_age_override` filter replaces the engine's configured cutoff for
// this run only.
#[tokio::test]
async fn max_age_override_replaces_configured_cutoff() {
    use xpost_core::SyncFilters;

    let h = harness();
    h.primary.push_list_posts(Ok(vec![post("p1", Visibility::Public, Duration::from_secs(60))]));

    let filters = SyncFilters {
        max_age_override: Some(chrono::Duration::seconds(30)),
    };
    let report = h.engine.sync_with_overrides(None, Some(&filters)).await.unwrap();

    assert_eq!(report.skipped_old, 1, "60s-old post must be skipped under a 30s override");
    assert_eq!(report.processed, 0);
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use xpost_core::{PlatformConfig, PlatformRegistry, PlatformType, TokenRecord};
use xpost_testing::{InMemoryLock, InMemoryTokenStore, ScriptedPlatformClient};

use super::*;

fn registry_with(client: Arc<ScriptedPlatformClient>) -> PlatformRegistry {
    let mut registry = PlatformRegistry::new("memos-main");
    registry.register(
        PlatformConfig {
            name: "threads-a".into(),
            platform_type: PlatformType::Threads,
            enabled: true,
            sync_enabled: true,
            sync_from: Default::default(),
            credential: None,
        },
        client,
    );
    registry
}

fn registry_with_two(
    first: (&str, Arc<ScriptedPlatformClient>),
    second: (&str, Arc<ScriptedPlatformClient>),
) -> PlatformRegistry {
    let mut registry = PlatformRegistry::new("memos-main");
    for (name, client) in [first, second] {
        registry.register(
            PlatformConfig {
                name: name.to_string(),
                platform_type: PlatformType::Threads,
                enabled: true,
                sync_enabled: true,
                sync_from: Default::default(),
                credential: None,
            },
            client,
        );
    }
    registry
}

// Scenario 6 (spec.md §8): a token within the refresh threshold is refreshed
// and the new expiry is stored.
#[tokio::test]
async fn token_within_threshold_is_refreshed() {
    let client = Arc::new(ScriptedPlatformClient::new("threads-a", PlatformType::Threads));
    let new_expiry = Utc::now() + chrono::Duration::days(60);
    client.set_refresh_response(Ok(("new-token".into(), Some(new_expiry))));

    let store = Arc::new(InMemoryTokenStore::new());
    store.seed(TokenRecord {
        platform: "threads-a".into(),
        access_token: "old-token".into(),
        expires_at: Some(Utc::now() + chrono::Duration::days(6)),
        updated_at: Utc::now() - chrono::Duration::days(2),
    });

    let manager = TokenLifecycleManager::new(
        Arc::new(registry_with(client)),
        store.clone(),
        Arc::new(InMemoryLock::new()),
        Metrics::noop(),
        TokenLifecycleConfig::default(),
    );

    let report = manager.tick().await.unwrap();
    assert_eq!(report.outcomes, vec![("threads-a".to_string(), RefreshOutcome::Refreshed)]);

    let stored = store.get("threads-a").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "new-token");
    assert_eq!(stored.expires_at, Some(new_expiry));
}

#[tokio::test]
async fn token_outside_threshold_is_left_alone() {
    let client = Arc::new(ScriptedPlatformClient::new("threads-a", PlatformType::Threads));
    client.set_refresh_response(Ok(("new-token".into(), None)));

    let store = Arc::new(InMemoryTokenStore::new());
    store.seed(TokenRecord {
        platform: "threads-a".into(),
        access_token: "old-token".into(),
        expires_at: Some(Utc::now() + chrono::Duration::days(30)),
        updated_at: Utc::now() - chrono::Duration::days(2),
    });

    let manager = TokenLifecycleManager::new(
        Arc::new(registry_with(client)),
        store.clone(),
        Arc::new(InMemoryLock::new()),
        Metrics::noop(),
        TokenLifecycleConfig::default(),
    );

    let report = manager.tick().await.unwrap();
    assert_eq!(report.outcomes, vec![("threads-a".to_string(), RefreshOutcome::NotDue)]);
    assert_eq!(store.get("threads-a").await.unwrap().unwrap().access_token, "old-token");
}

#[tokio::test]
async fn failed_refresh_with_time_remaining_does_not_error_the_tick() {
    let client = Arc::new(ScriptedPlatformClient::new("threads-a", PlatformType::Threads));
    client.set_refresh_response(Err(XpostError::platform("threads-a", "503")));

    let store = Arc::new(InMemoryTokenStore::new());
    store.seed(TokenRecord {
        platform: "threads-a".into(),
        access_token: "old-token".into(),
        expires_at: Some(Utc::now() + chrono::Duration::days(1)),
        updated_at: Utc::now() - chrono::Duration::days(2),
    });

    let manager = TokenLifecycleManager::new(
        Arc::new(registry_with(client)),
        store.clone(),
        Arc::new(InMemoryLock::new()),
        Metrics::noop(),
        TokenLifecycleConfig::default(),
    );

    let report = manager.tick().await.unwrap();
    assert_eq!(report.outcomes, vec![("threads-a".to_string(), RefreshOutcome::FailedStillValid)]);
}

#[tokio::test]
async fn failed_refresh_on_already_expired_token_surfaces_as_error() {
    let client = Arc::new(ScriptedPlatformClient::new("threads-a", PlatformType::Threads));
    client.set_refresh_response(Err(XpostError::platform("threads-a", "invalid_grant")));

    let store = Arc::new(InMemoryTokenStore::new());
    store.seed(TokenRecord {
        platform: "threads-a".into(),
        access_token: "old-token".into(),
        expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
        updated_at: Utc::now() - chrono::Duration::days(2),
    });

    let manager = TokenLifecycleManager::new(
        Arc::new(registry_with(client)),
        store,
        Arc::new(InMemoryLock::new()),
        Metrics::noop(),
        TokenLifecycleConfig::default(),
    );

    assert!(manager.tick().await.is_err());
}

// One platform's already-expired refresh failure must not prevent the tick
// from reaching the remaining platforms.
#[tokio::test]
async fn one_platform_failure_does_not_block_the_next() {
    let failing = Arc::new(ScriptedPlatformClient::new("threads-a", PlatformType::Threads));
    failing.set_refresh_response(Err(XpostError::platform("threads-a", "invalid_grant")));

    let healthy = Arc::new(ScriptedPlatformClient::new("threads-b", PlatformType::Threads));
    healthy.set_refresh_response(Ok(("new-token".into(), Some(Utc::now() + chrono::Duration::days(60)))));

    let store = Arc::new(InMemoryTokenStore::new());
    store.seed(TokenRecord {
        platform: "threads-a".into(),
        access_token: "old-token".into(),
        expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
        updated_at: Utc::now() - chrono::Duration::days(2),
    });
    store.seed(TokenRecord {
        platform: "threads-b".into(),
        access_token: "old-token".into(),
        expires_at: Some(Utc::now() + chrono::Duration::days(6)),
        updated_at: Utc::now() - chrono::Duration::days(2),
    });

    let manager = TokenLifecycleManager::new(
        Arc::new(registry_with_two(("threads-a", failing), ("threads-b", healthy))),
        store.clone(),
        Arc::new(InMemoryLock::new()),
        Metrics::noop(),
        TokenLifecycleConfig::default(),
    );

    let err = manager.tick().await.unwrap_err();
    assert!(err.is_platform());
    assert_eq!(store.get("threads-b").await.unwrap().unwrap().access_token, "new-token");
}

#[tokio::test]
async fn concurrent_tick_while_lock_held_is_skipped() {
    let lock = Arc::new(InMemoryLock::new());
    let _guard = lock.acquire("token_refresh", Duration::from_secs(60)).await.unwrap();

    let client = Arc::new(ScriptedPlatformClient::new("threads-a", PlatformType::Threads));
    let manager = TokenLifecycleManager::new(
        Arc::new(registry_with(client)),
        Arc::new(InMemoryTokenStore::new()),
        lock,
        Metrics::noop(),
        TokenLifecycleConfig::default(),
    );

    let report = manager.tick().await.unwrap();
    assert!(report.skipped_lock_held);
}

#[tokio::test]
async fn refresh_manually_bypasses_threshold() {
    let client = Arc::new(ScriptedPlatformClient::new("threads-a", PlatformType::Threads));
    client.set_refresh_response(Ok(("forced-token".into(), Some(Utc::now() + chrono::Duration::days(90)))));

    let store = Arc::new(InMemoryTokenStore::new());
    store.seed(TokenRecord {
        platform: "threads-a".into(),
        access_token: "old-token".into(),
        expires_at: Some(Utc::now() + chrono::Duration::days(30)),
        updated_at: Utc::now(),
    });

    let manager = TokenLifecycleManager::new(
        Arc::new(registry_with(client)),
        store.clone(),
        Arc::new(InMemoryLock::new()),
        Metrics::noop(),
        TokenLifecycleConfig::default(),
    );

    let outcome = manager.refresh_manually("threads-a").await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Refreshed);
    assert_eq!(store.get("threads-a").await.unwrap().unwrap().access_token, "forced-token");
}

//! The sync engine: `spec.md` §4.5. One public operation, `Sync`, that
//! fetches from the primary platform, filters, persists, fans out to
//! targets, and records per-target outcomes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use slog_scope::{info, warn};
use xpost_common::{Metrics, XpostError};
use xpost_core::{
    CreateOutcome, CrossPostOutcome, Lock, PlatformRegistry, Post, PostRepository, StoredPost,
    SyncFilters, Visibility,
};

/// Tunables for one engine instance, matching the `SYNC_*` surface in
/// `spec.md` §6.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    pub limit: u32,
    pub max_age: Duration,
    pub sync_lock_ttl: Duration,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            max_age: Duration::from_secs(3600),
            sync_lock_ttl: Duration::from_secs(120),
        }
    }
}

/// Outcome summary for one `Sync` pass (`spec.md` §4.5 step 4).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// True when another replica already held the primary's sync lock;
    /// every other field is zero in that case (`spec.md` §8 scenario 5).
    pub no_op: bool,
    pub checked: u32,
    pub processed: u32,
    pub skipped_old: u32,
    pub skipped_private: u32,
    pub exists: u32,
    pub errored_posts: u32,
    pub cross_post_success: BTreeMap<String, u32>,
    pub cross_post_error: BTreeMap<String, u32>,
}

impl SyncReport {
    fn no_op() -> Self {
        Self {
            no_op: true,
            ..Default::default()
        }
    }

    fn record_success(&mut self, target: &str) {
        *self.cross_post_success.entry(target.to_string()).or_insert(0) += 1;
    }

    fn record_error(&mut self, target: &str) {
        *self.cross_post_error.entry(target.to_string()).or_insert(0) += 1;
    }
}

pub struct SyncEngine {
    registry: Arc<PlatformRegistry>,
    repository: Arc<dyn PostRepository>,
    lock: Arc<dyn Lock>,
    metrics: Metrics,
    config: SyncEngineConfig,
}

impl SyncEngine {
    pub fn new(
        registry: Arc<PlatformRegistry>,
        repository: Arc<dyn PostRepository>,
        lock: Arc<dyn Lock>,
        metrics: Metrics,
        config: SyncEngineConfig,
    ) -> Self {
        Self {
            registry,
            repository,
            lock,
            metrics,
            config,
        }
    }

    /// `spec.md` §4.5. Returns `Err` only for primary fetch / lock-acquire
    /// failures other than `LockHeld`; per-target and per-post failures are
    /// absorbed into the returned report.
    pub async fn sync(&self) -> Result<SyncReport, XpostError> {
        self.sync_with_overrides(None, None).await
    }

    /// Same as [`SyncEngine::sync`], but honors the `targets`/`filters`
    /// override `Scheduler::schedule` accepts (`spec.md` §4.6). `None`
    /// falls back to the registry's configured targets / the engine's
    /// default age cutoff.
    pub async fn sync_with_overrides(
        &self,
        targets: Option<&[String]>,
        filters: Option<&SyncFilters>,
    ) -> Result<SyncReport, XpostError> {
        let primary_name = self.registry.primary_name().to_string();
        let lock_name = format!("sync:{primary_name}");
        let started = Instant::now();

        let guard = match self.lock.acquire(&lock_name, self.config.sync_lock_ttl).await {
            Ok(guard) => guard,
            Err(err) if err.is_lock_held() => {
                info!("sync skipped: lock held"; "primary" => %primary_name);
                return Ok(SyncReport::no_op());
            }
            Err(err) => return Err(err),
        };

        let report = self.sync_locked(&primary_name, targets, filters).await;

        guard.release();
        self.metrics
            .observe_duration("operation_duration_seconds", started, &[("operation", "sync_operation")]);

        report
    }

    async fn sync_locked(
        &self,
        primary_name: &str,
        targets_override: Option<&[String]>,
        filters: Option<&SyncFilters>,
    ) -> Result<SyncReport, XpostError> {
        let primary = self.registry.primary()?;
        let targets = match targets_override {
            Some(t) => t.to_vec(),
            None => self.registry.targets_for_primary(),
        };
        let max_age = filters
            .and_then(|f| f.max_age_override)
            .unwrap_or_else(|| chrono::Duration::from_std(self.config.max_age).unwrap_or(chrono::Duration::zero()));

        let posts = match primary.list_posts(self.config.limit).await {
            Ok(posts) => posts,
            Err(err) => {
                warn!("primary fetch failed"; "primary" => %primary_name, "error" => %err);
                self.metrics.incr_with_tags(
                    "errors_total",
                    &[("main_social", primary_name), ("target", ""), ("error_type", "platform")],
                );
                return Err(err);
            }
        };

        let mut report = SyncReport::default();
        let now = Utc::now();

        for post in posts {
            report.checked += 1;

            if post.id.is_empty() {
                report.errored_posts += 1;
                warn!("post with empty id skipped"; "primary" => %primary_name);
                continue;
            }

            if self.is_too_old(&post, now, max_age) {
                report.skipped_old += 1;
                self.metrics.incr_with_tags(
                    "posts_processed_total",
                    &[("main_social", primary_name), ("status", "skipped_old")],
                );
                continue;
            }

            if post.visibility == Visibility::Private {
                report.skipped_private += 1;
                self.metrics.incr_with_tags(
                    "posts_processed_total",
                    &[("main_social", primary_name), ("status", "skipped_private")],
                );
                continue;
            }

            let stored = match self.dedup_and_persist(primary_name, &post, now).await {
                Ok(DedupOutcome::New(stored)) => {
                    report.processed += 1;
                    self.metrics.incr_with_tags(
                        "posts_processed_total",
                        &[("main_social", primary_name), ("status", "processed")],
                    );
                    stored
                }
                Ok(DedupOutcome::Existing(stored)) => {
                    report.exists += 1;
                    self.metrics.incr_with_tags(
                        "posts_processed_total",
                        &[("main_social", primary_name), ("status", "exists")],
                    );
                    stored
                }
                Err(err) => {
                    warn!("repository failure processing post"; "primary" => %primary_name, "post_id" => %post.id, "error" => %err);
                    self.metrics.incr_with_tags(
                        "errors_total",
                        &[("main_social", primary_name), ("target", ""), ("error_type", "database")],
                    );
                    continue;
                }
            };

            self.fan_out(primary_name, &post, &stored, &targets, &mut report)
                .await;
        }

        Ok(report)
    }

    fn is_too_old(&self, post: &Post, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        let age = now.signed_duration_since(post.created_at);
        // Closed lower boundary: exactly `max_age` old is still processed
        // (spec.md §8 boundaries).
        age > max_age
    }

    async fn dedup_and_persist(
        &self,
        primary_name: &str,
        post: &Post,
        now: DateTime<Utc>,
    ) -> Result<DedupOutcome, XpostError> {
        if let Some(stored) = self.repository.get_by_source(primary_name, &post.id).await? {
            return Ok(DedupOutcome::Existing(stored));
        }

        let candidate = StoredPost::from_post(String::new(), post, now);
        match self.repository.create(candidate).await? {
            CreateOutcome::Created(id) => {
                let mut stored = self
                    .repository
                    .get_by_source(primary_name, &post.id)
                    .await?
                    .ok_or_else(|| XpostError::database("created post vanished"))?;
                stored.id = id;
                Ok(DedupOutcome::New(stored))
            }
            CreateOutcome::AlreadyExists => {
                // Lost a create race to another worker/replica; re-fetch and
                // treat it as processed, per spec.md §4.5.d.
                let stored = self
                    .repository
                    .get_by_source(primary_name, &post.id)
                    .await?
                    .ok_or_else(|| XpostError::database("AlreadyExists but not found"))?;
                Ok(DedupOutcome::New(stored))
            }
        }
    }

    async fn fan_out(
        &self,
        primary_name: &str,
        post: &Post,
        stored: &StoredPost,
        targets: &[String],
        report: &mut SyncReport,
    ) {
        for target in targets {
            let Some(config) = self.registry.config(target) else {
                continue;
            };
            if !post.visibility.supported_by(config.platform_type) {
                continue;
            }
            if stored
                .cross_post_status
                .get(target)
                .map(|o| o.is_done())
                .unwrap_or(false)
            {
                continue;
            }

            let Some(client) = self.registry.get(target) else {
                continue;
            };

            let outcome = match client.post(post).await {
                Ok(result) => {
                    report.record_success(target);
                    self.metrics.incr_with_tags(
                        "cross_posts_total",
                        &[("main_social", primary_name), ("target", target), ("status", "success")],
                    );
                    CrossPostOutcome::succeeded(result.platform_id(), Utc::now())
                }
                Err(err) => {
                    report.record_error(target);
                    self.metrics.incr_with_tags(
                        "cross_posts_total",
                        &[("main_social", primary_name), ("target", target), ("status", "error")],
                    );
                    self.metrics.incr_with_tags(
                        "errors_total",
                        &[("main_social", primary_name), ("target", target), ("error_type", "platform")],
                    );
                    CrossPostOutcome::failed(err.to_string(), Utc::now())
                }
            };

            if let Err(err) = self
                .repository
                .update_cross_post_outcome(&stored.id, target, outcome)
                .await
            {
                warn!("failed to persist cross-post outcome"; "target" => target, "error" => %err);
            }
        }
    }
}

enum DedupOutcome {
    New(StoredPost),
    Existing(StoredPost),
}

#[cfg(test)]
mod tests;

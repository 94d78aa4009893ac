//! `TokenLifecycleManager`: `spec.md` §4.7. Keeps long-lived OAuth tokens
//! refreshed ahead of expiry, under a named lock shared across replicas.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use slog_scope::{info, warn};
use xpost_common::{Metrics, XpostError};
use xpost_core::{Lock, PlatformRegistry, TokenStore};

#[derive(Debug, Clone)]
pub struct TokenLifecycleConfig {
    pub check_interval: Duration,
    pub refresh_threshold: Duration,
    /// Minimum time since a token's last update before it is eligible for
    /// another refresh, preventing refresh storms when a platform's clock
    /// skew or a misbehaving client keeps reporting an imminent expiry.
    pub minimum_age: Duration,
    pub lock_ttl: Duration,
}

impl Default for TokenLifecycleConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(3600),
            refresh_threshold: Duration::from_secs(7 * 24 * 3600),
            minimum_age: Duration::from_secs(24 * 3600),
            lock_ttl: Duration::from_secs(5 * 60),
        }
    }
}

/// Per-platform result of one refresh attempt, for test assertions and
/// operator-facing summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    NotApplicable,
    NotFound,
    Perpetual,
    NotDue,
    RateLimited,
    FailedStillValid,
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub skipped_lock_held: bool,
    pub outcomes: Vec<(String, RefreshOutcome)>,
}

pub struct TokenLifecycleManager {
    registry: Arc<PlatformRegistry>,
    store: Arc<dyn TokenStore>,
    lock: Arc<dyn Lock>,
    metrics: Metrics,
    config: TokenLifecycleConfig,
}

impl TokenLifecycleManager {
    pub fn new(
        registry: Arc<PlatformRegistry>,
        store: Arc<dyn TokenStore>,
        lock: Arc<dyn Lock>,
        metrics: Metrics,
        config: TokenLifecycleConfig,
    ) -> Self {
        Self {
            registry,
            store,
            lock,
            metrics,
            config,
        }
    }

    /// One pass of the loop described in `spec.md` §4.7. Intended to be
    /// driven by a `tokio::time::interval` ticker in the hosting process.
    pub async fn tick(&self) -> Result<TickReport, XpostError> {
        let guard = match self.lock.acquire("token_refresh", self.config.lock_ttl).await {
            Ok(guard) => guard,
            Err(err) if err.is_lock_held() => {
                info!("token refresh tick skipped: lock held");
                return Ok(TickReport {
                    skipped_lock_held: true,
                    outcomes: Vec::new(),
                });
            }
            Err(err) => return Err(err),
        };

        let mut report = TickReport::default();
        let mut first_error = None;
        // Every platform gets a chance regardless of earlier failures
        // (`spec.md` §4.7: "for each platform..."); one platform's already-
        // expired token must not skip the rest of the scan.
        for name in self.registry.all_names() {
            let Some(client) = self.registry.get(&name) else {
                continue;
            };
            if !client.supports_refresh() {
                continue;
            }
            match self.refresh_one(&name, false).await {
                Ok(outcome) => report.outcomes.push((name, outcome)),
                Err(err) => {
                    warn!("token refresh failed on an expired token"; "platform" => %name, "error" => %err);
                    self.metrics.incr_with_tags(
                        "errors_total",
                        &[("main_social", &name), ("target", ""), ("error_type", "platform")],
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        guard.release();
        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Bypasses the threshold/rate-limit checks and forces a refresh,
    /// single-flighted per platform so concurrent manual and scheduled
    /// refreshes of the same platform never race (`spec.md` §4.4, §4.7).
    pub async fn refresh_manually(&self, platform: &str) -> Result<RefreshOutcome, XpostError> {
        let lock_name = format!("token_refresh:{platform}");
        let guard = self.lock.acquire(&lock_name, self.config.lock_ttl).await?;
        let outcome = self.refresh_one(platform, true).await;
        guard.release();
        outcome
    }

    async fn refresh_one(&self, platform_name: &str, force: bool) -> Result<RefreshOutcome, XpostError> {
        let Some(client) = self.registry.get(platform_name) else {
            return Err(XpostError::config(format!("unknown platform {platform_name}")));
        };

        let Some(token) = self.store.get(platform_name).await? else {
            info!("no token on file, skipping"; "platform" => platform_name);
            return Ok(RefreshOutcome::NotFound);
        };

        let Some(expires_at) = token.expires_at else {
            return Ok(RefreshOutcome::Perpetual);
        };

        let now = Utc::now();
        let delta = expires_at - now;

        if !force {
            let threshold = chrono::Duration::from_std(self.config.refresh_threshold)
                .unwrap_or(chrono::Duration::zero());
            if delta > threshold {
                return Ok(RefreshOutcome::NotDue);
            }
            let minimum_age = chrono::Duration::from_std(self.config.minimum_age)
                .unwrap_or(chrono::Duration::zero());
            if now - token.updated_at < minimum_age {
                return Ok(RefreshOutcome::RateLimited);
            }
        }

        match client.refresh_token(&token).await {
            Ok((new_token, new_expiry)) => {
                self.store.put(platform_name, new_token, new_expiry).await?;
                self.metrics.incr_with_tags("token_refresh_total", &[("main_social", platform_name), ("status", "success")]);
                info!("token refreshed"; "platform" => platform_name);
                Ok(RefreshOutcome::Refreshed)
            }
            Err(err) => {
                self.metrics.incr_with_tags("token_refresh_total", &[("main_social", platform_name), ("status", "error")]);
                if delta > chrono::Duration::zero() {
                    warn!("token refresh failed, current token still valid"; "platform" => platform_name, "error" => %err);
                    Ok(RefreshOutcome::FailedStillValid)
                } else {
                    Err(err)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;

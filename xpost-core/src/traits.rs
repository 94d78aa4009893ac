//! Narrow capability traits consumed by the core (`spec.md` §4.1-§4.4).
//! Concrete realizations (an HTTP client per social platform, a document
//! store, a distributed lock service) are external collaborators; the core
//! only depends on these interfaces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use xpost_common::XpostError;

use crate::model::{CrossPostResult, Post, PlatformType, StoredPost, TokenRecord};

/// The capability every platform exposes (`spec.md` §4.1).
#[async_trait]
pub trait PlatformClient: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn platform_type(&self) -> PlatformType;

    /// Newest-first authored timeline of the authenticated identity. May be
    /// empty. Never a public firehose.
    async fn list_posts(&self, limit: u32) -> Result<Vec<Post>, XpostError>;

    /// Publishes `post` to this platform, returning whatever identifier the
    /// platform assigned (if any).
    async fn post(&self, post: &Post) -> Result<CrossPostResult, XpostError>;

    /// Whether this client supports `refresh_token`. Probed once at
    /// construction time by callers that need to know (the token lifecycle
    /// manager); the default is "no", matching non-OAuth platforms.
    fn supports_refresh(&self) -> bool {
        false
    }

    /// Refreshes the long-lived OAuth token. Only meaningful when
    /// `supports_refresh()` is true. Callers must only invoke this when
    /// `expires_at - now > minimum_age` (`spec.md` §4.1).
    async fn refresh_token(
        &self,
        _current: &TokenRecord,
    ) -> Result<(String, Option<DateTime<Utc>>), XpostError> {
        Err(XpostError::not_supported("refresh_token"))
    }
}

/// Filter criteria for [`PostRepository::list`]'s read-only surface.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub source_platform: Option<String>,
}

/// Signal returned by [`PostRepository::create`] when a `StoredPost` with
/// the same `(source_platform, original_id)` already exists (I1). The
/// engine treats this as "fetch and continue", not an error.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(String),
    AlreadyExists,
}

/// Content-addressed storage of synced posts and their per-target
/// cross-post status (`spec.md` §4.2).
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn get_by_source(
        &self,
        source: &str,
        original_id: &str,
    ) -> Result<Option<StoredPost>, XpostError>;

    async fn create(&self, post: StoredPost) -> Result<CreateOutcome, XpostError>;

    /// Atomic per-target field update: never overwrites another target's
    /// outcome (I5).
    async fn update_cross_post_outcome(
        &self,
        id: &str,
        target: &str,
        outcome: crate::model::CrossPostOutcome,
    ) -> Result<(), XpostError>;

    async fn list(
        &self,
        filter: PostFilter,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<StoredPost>, XpostError>;
}

/// Read/write access to OAuth tokens by platform (`spec.md` §4.3).
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, platform: &str) -> Result<Option<TokenRecord>, XpostError>;

    /// Upsert; creates a fresh record if absent.
    async fn put(
        &self,
        platform: &str,
        access_token: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), XpostError>;
}

/// A handle to a held distributed lock. Dropping it releases the lock,
/// in addition to the explicit `release` call, so a panicking caller can
/// never leak a lock past its TTL (`spec.md` §4.4).
pub trait LockGuard: Send + std::fmt::Debug {
    /// Releases the lock early, before the guard is dropped.
    fn release(self: Box<Self>);
}

/// Named distributed mutex with TTL, for single-flight execution across
/// replicas (`spec.md` §4.4). Held-beyond-TTL counts as released: fencing
/// relies entirely on the TTL, not on an explicit heartbeat.
#[async_trait]
pub trait Lock: Send + Sync {
    async fn acquire(
        &self,
        name: &str,
        ttl: std::time::Duration,
    ) -> Result<Box<dyn LockGuard>, XpostError>;
}

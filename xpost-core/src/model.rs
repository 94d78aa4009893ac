//! The canonical data model: `spec.md` §3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audience scope of a post, canonicalized across every platform type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
    Direct,
}

/// The closed set of platform types the registry understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Memos,
    Mastodon,
    Bluesky,
    Threads,
    Telegram,
}

impl Visibility {
    /// The visibility compatibility matrix from `spec.md` §6.
    pub fn supported_by(self, platform: PlatformType) -> bool {
        use PlatformType::*;
        use Visibility::*;
        match (platform, self) {
            (Mastodon, _) => true,
            (Bluesky, Public | Private) => true,
            (Bluesky, Unlisted | Direct) => false,
            (Threads, Public | Private) => true,
            (Threads, Unlisted | Direct) => false,
            (Memos, Public | Unlisted | Private) => true,
            (Memos, Direct) => false,
            (Telegram, Public | Private) => true,
            (Telegram, Unlisted | Direct) => false,
        }
    }

    /// Canonical string form used by every platform type except memos.
    pub fn as_canonical_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
            Visibility::Direct => "direct",
        }
    }

    /// Encodes this visibility the way `platform` expects it on the wire.
    /// Only `memos` uses a distinct vocabulary (`PUBLIC`/`PROTECTED`/`PRIVATE`).
    pub fn to_wire(self, platform: PlatformType) -> Option<&'static str> {
        if !self.supported_by(platform) {
            return None;
        }
        Some(match platform {
            PlatformType::Memos => match self {
                Visibility::Public => "PUBLIC",
                Visibility::Unlisted => "PROTECTED",
                Visibility::Private => "PRIVATE",
                Visibility::Direct => unreachable!("direct is unsupported by memos"),
            },
            _ => self.as_canonical_str(),
        })
    }

    /// Decodes a wire-form visibility for `platform` back to the canonical
    /// enum, the inverse of [`Visibility::to_wire`].
    pub fn from_wire(platform: PlatformType, wire: &str) -> Option<Visibility> {
        match platform {
            PlatformType::Memos => Some(match wire {
                "PUBLIC" => Visibility::Public,
                "PROTECTED" => Visibility::Unlisted,
                "PRIVATE" => Visibility::Private,
                _ => return None,
            }),
            _ => Some(match wire {
                "public" => Visibility::Public,
                "unlisted" => Visibility::Unlisted,
                "private" => Visibility::Private,
                "direct" => Visibility::Direct,
                _ => return None,
            }),
        }
    }
}

/// A single attached media item. Media bytes are lazily fetched: the engine
/// only ever carries either inline bytes or a fetch URL (`spec.md` §1 Non-goals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub description: Option<String>,
    #[serde(flatten)]
    pub source: MediaSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    Inline { bytes: Vec<u8> },
    Url { url: String },
}

/// A post as read from a platform's timeline, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub visibility: Visibility,
    pub media: Vec<Media>,
    pub source_platform: String,
    pub original_id: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// A post as originally observed from its source: `original_id` always
    /// equals `id` when freshly read (`spec.md` §3 Post fields).
    pub fn from_source(
        source_platform: impl Into<String>,
        id: impl Into<String>,
        content: impl Into<String>,
        visibility: Visibility,
        media: Vec<Media>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            original_id: id.clone(),
            id,
            content: content.into(),
            visibility,
            media,
            source_platform: source_platform.into(),
            created_at,
        }
    }

    /// SHA-256 of the post's textual content, used by the memos-ingest
    /// variant for content-change detection (`spec.md` Glossary: Content hash).
    /// The core engine never consults this; it exists for callers that
    /// implement re-post-on-edit detection outside the sync algorithm.
    pub fn content_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// The outcome of the most recent cross-post attempt to a single target
/// platform for a single `StoredPost` (`spec.md` §3 CrossPostOutcome).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrossPostOutcome {
    pub success: bool,
    pub cross_posted: bool,
    pub platform_id: String,
    pub error: String,
    pub posted_at: Option<DateTime<Utc>>,
}

impl CrossPostOutcome {
    pub fn succeeded(platform_id: String, posted_at: DateTime<Utc>) -> Self {
        Self {
            success: true,
            cross_posted: true,
            platform_id,
            error: String::new(),
            posted_at: Some(posted_at),
        }
    }

    pub fn failed(error: String, posted_at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            cross_posted: false,
            error,
            platform_id: String::new(),
            posted_at: Some(posted_at),
        }
    }

    /// I2: once a target has successfully cross-posted, the engine must
    /// never repost to it for the same `StoredPost`.
    pub fn is_done(&self) -> bool {
        self.success && self.cross_posted
    }
}

/// A persisted record of one primary-sourced post, keyed by
/// `(source_platform, original_id)` (I1). Field names match the `posts`
/// collection shape from `spec.md` §6 exactly on the wire (`social`,
/// `social_id`, `media_ids`), while keeping Rust-idiomatic names in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPost {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub visibility: Visibility,
    #[serde(rename = "media_ids")]
    pub media: Vec<Media>,
    #[serde(rename = "social")]
    pub source_platform: String,
    #[serde(rename = "social_id")]
    pub original_id: String,
    /// Original authoring instant on the source platform.
    pub post_created_at: DateTime<Utc>,
    /// Record timestamps, distinct from `post_created_at` (spec §3).
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Content hash at last observation; see [`Post::content_hash`].
    pub content_hash: String,
    pub cross_post_status: BTreeMap<String, CrossPostOutcome>,
}

impl StoredPost {
    pub fn from_post(id: impl Into<String>, post: &Post, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            content: post.content.clone(),
            visibility: post.visibility,
            media: post.media.clone(),
            source_platform: post.source_platform.clone(),
            original_id: post.original_id.clone(),
            post_created_at: post.created_at,
            created_at: now,
            updated_at: now,
            content_hash: post.content_hash(),
            cross_post_status: BTreeMap::new(),
        }
    }
}

/// A static, non-refreshing credential for a platform that isn't driven by
/// `TokenStore`'s OAuth refresh loop (e.g. a Telegram bot token or a
/// long-lived Mastodon API key). Distinct from `TokenRecord`, which only
/// covers the refresh-loop path (`spec.md` §4.3, §4.7); a platform has at
/// most one of the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformCredential {
    pub value: String,
}

/// Platform credential/config record (`spec.md` §3 PlatformConfig).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    pub platform_type: PlatformType,
    pub enabled: bool,
    pub sync_enabled: bool,
    /// Source names this platform accepts cross-posts from; `"*"` means any.
    pub sync_from: std::collections::BTreeSet<String>,
    /// Static credential for platforms outside the `TokenStore` refresh loop.
    pub credential: Option<PlatformCredential>,
}

impl PlatformConfig {
    pub fn accepts_source(&self, source: &str) -> bool {
        self.sync_from.contains("*") || self.sync_from.contains(source)
    }
}

/// OAuth token material for one platform (`spec.md` §3 TokenRecord).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub platform: String,
    pub access_token: String,
    /// Tokens without an expiry are treated as perpetual.
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Priority ordering for `SyncTask`s: `Urgent > High > Normal > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    Auto,
    Manual,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Optional per-sync filtering criteria, carried through from `Schedule(...)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncFilters {
    pub max_age_override: Option<chrono::Duration>,
}

/// A queued unit of sync work (`spec.md` §3 SyncTask).
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub id: u64,
    pub task_type: TaskType,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub retries: u32,
    pub max_retries: u32,
    pub targets: Option<Vec<String>>,
    pub filters: Option<SyncFilters>,
    pub status: TaskStatus,
}

/// A target-assigned cross-post result (`spec.md` §4.1).
#[derive(Debug, Clone, Default)]
pub struct CrossPostResult {
    pub id: Option<String>,
    pub uri: Option<String>,
}

impl CrossPostResult {
    /// "prefer `id` field, else `uri`, else empty string" (`spec.md` §4.5.f).
    pub fn platform_id(&self) -> String {
        self.id
            .clone()
            .or_else(|| self.uri.clone())
            .unwrap_or_default()
    }
}

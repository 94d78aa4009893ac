//! An in-memory `PostRepository`, mirroring the stateful-stub shape of
//! `syncstorage-db`'s `mock.rs` but backing every call with real storage so
//! tests can exercise I1/I2/I5 and the P1/P5/P6 testable properties.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use xpost_common::XpostError;
use xpost_core::{CreateOutcome, CrossPostOutcome, PostFilter, PostRepository, StoredPost};

#[derive(Default)]
pub struct InMemoryPostRepository {
    by_id: Mutex<BTreeMap<String, StoredPost>>,
    next_id: Mutex<u64>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(source: &str, original_id: &str) -> String {
        format!("{source}:{original_id}")
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn get_by_source(
        &self,
        source: &str,
        original_id: &str,
    ) -> Result<Option<StoredPost>, XpostError> {
        let key = Self::key(source, original_id);
        let store = self.by_id.lock().unwrap();
        Ok(store.values().find(|p| Self::key(&p.source_platform, &p.original_id) == key).cloned())
    }

    async fn create(&self, mut post: StoredPost) -> Result<CreateOutcome, XpostError> {
        let mut store = self.by_id.lock().unwrap();
        let dup = store
            .values()
            .any(|p| p.source_platform == post.source_platform && p.original_id == post.original_id);
        if dup {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = next_id.to_string();
        post.id = id.clone();
        store.insert(id.clone(), post);
        Ok(CreateOutcome::Created(id))
    }

    async fn update_cross_post_outcome(
        &self,
        id: &str,
        target: &str,
        outcome: CrossPostOutcome,
    ) -> Result<(), XpostError> {
        let mut store = self.by_id.lock().unwrap();
        let post = store
            .get_mut(id)
            .ok_or_else(|| XpostError::database(format!("no stored post with id {id}")))?;
        post.cross_post_status.insert(target.to_string(), outcome);
        post.updated_at = Utc::now();
        Ok(())
    }

    async fn list(
        &self,
        filter: PostFilter,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<StoredPost>, XpostError> {
        let store = self.by_id.lock().unwrap();
        let mut matched: Vec<StoredPost> = store
            .values()
            .filter(|p| {
                filter
                    .source_platform
                    .as_ref()
                    .map(|s| s == &p.source_platform)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.post_created_at.cmp(&a.post_created_at));
        Ok(matched.into_iter().skip(skip).take(limit).collect())
    }
}

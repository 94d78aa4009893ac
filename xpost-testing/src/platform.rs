//! A scriptable `PlatformClient`, used to drive the partial-failure and
//! lock-contention scenarios from `spec.md` §8 without a real HTTP backend.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use xpost_common::XpostError;
use xpost_core::{CrossPostResult, Post, PlatformClient, PlatformType, TokenRecord};

type PostResponse = Result<CrossPostResult, XpostError>;

pub struct ScriptedPlatformClient {
    name: String,
    platform_type: PlatformType,
    list_posts_responses: Mutex<Vec<Result<Vec<Post>, XpostError>>>,
    post_responses: Mutex<Vec<PostResponse>>,
    posts_received: Mutex<Vec<Post>>,
    refresh_response: Mutex<Option<Result<(String, Option<DateTime<Utc>>), XpostError>>>,
}

impl ScriptedPlatformClient {
    pub fn new(name: impl Into<String>, platform_type: PlatformType) -> Self {
        Self {
            name: name.into(),
            platform_type,
            list_posts_responses: Mutex::new(Vec::new()),
            post_responses: Mutex::new(Vec::new()),
            posts_received: Mutex::new(Vec::new()),
            refresh_response: Mutex::new(None),
        }
    }

    /// Queues one `list_posts` response, consumed FIFO across calls.
    pub fn push_list_posts(&self, response: Result<Vec<Post>, XpostError>) -> &Self {
        self.list_posts_responses.lock().unwrap().push(response);
        self
    }

    /// Queues one `post` response, consumed FIFO across calls.
    pub fn push_post_result(&self, response: PostResponse) -> &Self {
        self.post_responses.lock().unwrap().push(response);
        self
    }

    pub fn set_refresh_response(
        &self,
        response: Result<(String, Option<DateTime<Utc>>), XpostError>,
    ) {
        *self.refresh_response.lock().unwrap() = Some(response);
    }

    /// Every `Post` this client's `post()` was invoked with, in call order —
    /// used to assert P2/P3 (no private posts, no unsupported visibility).
    pub fn posts_received(&self) -> Vec<Post> {
        self.posts_received.lock().unwrap().clone()
    }

    pub fn post_call_count(&self) -> usize {
        self.posts_received.lock().unwrap().len()
    }
}

#[async_trait]
impl PlatformClient for ScriptedPlatformClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn platform_type(&self) -> PlatformType {
        self.platform_type
    }

    async fn list_posts(&self, _limit: u32) -> Result<Vec<Post>, XpostError> {
        let mut responses = self.list_posts_responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(vec![]);
        }
        responses.remove(0)
    }

    async fn post(&self, post: &Post) -> Result<CrossPostResult, XpostError> {
        self.posts_received.lock().unwrap().push(post.clone());
        let mut responses = self.post_responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(CrossPostResult {
                id: Some(format!("{}-generated", self.name)),
                uri: None,
            });
        }
        responses.remove(0)
    }

    fn supports_refresh(&self) -> bool {
        self.refresh_response.lock().unwrap().is_some()
    }

    async fn refresh_token(
        &self,
        _current: &TokenRecord,
    ) -> Result<(String, Option<DateTime<Utc>>), XpostError> {
        self.refresh_response
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(XpostError::not_supported("refresh_token")))
    }
}

impl std::fmt::Debug for ScriptedPlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedPlatformClient")
            .field("name", &self.name)
            .field("platform_type", &self.platform_type)
            .finish()
    }
}

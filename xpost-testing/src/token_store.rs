use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use xpost_common::XpostError;
use xpost_core::{TokenRecord, TokenStore};

#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<String, TokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: TokenRecord) {
        self.tokens.lock().unwrap().insert(record.platform.clone(), record);
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, platform: &str) -> Result<Option<TokenRecord>, XpostError> {
        Ok(self.tokens.lock().unwrap().get(platform).cloned())
    }

    async fn put(
        &self,
        platform: &str,
        access_token: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), XpostError> {
        self.tokens.lock().unwrap().insert(
            platform.to_string(),
            TokenRecord {
                platform: platform.to_string(),
                access_token,
                expires_at,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}

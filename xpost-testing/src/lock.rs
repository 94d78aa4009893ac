//! An in-memory `Lock`, TTL-aware, enough to exercise single-flight
//! behavior (P4) under concurrent `tokio::spawn`s within one process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use xpost_common::XpostError;
use xpost_core::{Lock, LockGuard};

#[derive(Default)]
pub struct InMemoryLock {
    held: Arc<Mutex<HashMap<String, Instant>>>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
struct InMemoryLockGuard {
    held: Arc<Mutex<HashMap<String, Instant>>>,
    name: String,
    acquired_at: Instant,
}

impl LockGuard for InMemoryLockGuard {
    fn release(self: Box<Self>) {
        self.do_release();
    }
}

impl InMemoryLockGuard {
    fn do_release(&self) {
        let mut held = self.held.lock().unwrap();
        // Only remove the entry if it's still ours: a guard that outlived
        // its TTL must not evict a newer holder's lock.
        if held.get(&self.name) == Some(&self.acquired_at) {
            held.remove(&self.name);
        }
    }
}

impl Drop for InMemoryLockGuard {
    fn drop(&mut self) {
        self.do_release();
    }
}

#[async_trait]
impl Lock for InMemoryLock {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<Box<dyn LockGuard>, XpostError> {
        let now = Instant::now();
        let mut held = self.held.lock().unwrap();
        if let Some(expiry) = held.get(name) {
            if *expiry > now {
                return Err(XpostError::lock_held(name));
            }
        }
        let expiry = now + ttl;
        held.insert(name.to_string(), expiry);
        drop(held);
        Ok(Box::new(InMemoryLockGuard {
            held: self.held.clone(),
            name: name.to_string(),
            acquired_at: expiry,
        }))
    }
}

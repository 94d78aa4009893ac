//! `PlatformRegistry`: maps platform name to [`PlatformClient`] + config,
//! and resolves the primary/targets split (`spec.md` §2, §4.5).

use std::collections::BTreeMap;
use std::sync::Arc;

use xpost_common::XpostError;

use crate::model::PlatformConfig;
use crate::traits::PlatformClient;

struct Entry {
    config: PlatformConfig,
    client: Arc<dyn PlatformClient>,
}

/// Holds every configured platform and knows which one is primary.
pub struct PlatformRegistry {
    primary_name: String,
    entries: BTreeMap<String, Entry>,
}

impl PlatformRegistry {
    pub fn new(primary_name: impl Into<String>) -> Self {
        Self {
            primary_name: primary_name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, config: PlatformConfig, client: Arc<dyn PlatformClient>) {
        self.entries.insert(
            config.name.clone(),
            Entry { config, client },
        );
    }

    pub fn primary_name(&self) -> &str {
        &self.primary_name
    }

    pub fn primary(&self) -> Result<Arc<dyn PlatformClient>, XpostError> {
        self.entries
            .get(&self.primary_name)
            .map(|e| e.client.clone())
            .ok_or_else(|| XpostError::config(format!("unknown primary platform {}", self.primary_name)))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PlatformClient>> {
        self.entries.get(name).map(|e| e.client.clone())
    }

    pub fn config(&self, name: &str) -> Option<&PlatformConfig> {
        self.entries.get(name).map(|e| &e.config)
    }

    /// Every registered platform name, in deterministic (name-sorted) order.
    /// Used by the token lifecycle manager, which must consider every
    /// platform, not just sync targets (`spec.md` §4.7).
    pub fn all_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Every enabled, sync-enabled target that accepts posts from the
    /// primary, in deterministic (name-sorted) configured order, excluding
    /// the primary itself even if misconfigured into its own target list
    /// (`spec.md` §4.5 tie-breaks).
    pub fn targets_for_primary(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.config.name != self.primary_name)
            .filter(|e| e.config.enabled && e.config.sync_enabled)
            .filter(|e| e.config.accepts_source(&self.primary_name))
            .map(|e| e.config.name.clone())
            .collect()
    }
}

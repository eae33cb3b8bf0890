//! Offline collaborators: a captured conversation record and an
//! optional file-id to URL map stand in for the live backend.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use turnscribe_core::{ConversationFetcher, ConversationRecord, ImageUrlResolver};

/// Serves a conversation record loaded from disk.
pub struct LocalFetcher {
    record: ConversationRecord,
}

impl LocalFetcher {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read conversation file {}", path.display()))?;
        let record = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse conversation file {}", path.display()))?;
        Ok(Self { record })
    }
}

#[async_trait]
impl ConversationFetcher for LocalFetcher {
    async fn fetch(
        &self,
        _conversation_id: &str,
        _token: &str,
    ) -> turnscribe_core::Result<ConversationRecord> {
        Ok(self.record.clone())
    }
}

/// Resolves image file ids from a recorded map; unknown ids resolve
/// to nothing, which the pipeline tolerates per image.
#[derive(Default)]
pub struct MapImageResolver {
    urls: HashMap<String, String>,
}

impl MapImageResolver {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read image map {}", path.display()))?;
        let urls = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse image map {}", path.display()))?;
        Ok(Self { urls })
    }
}

#[async_trait]
impl ImageUrlResolver for MapImageResolver {
    async fn resolve(&self, file_id: &str, _conversation_id: &str) -> Option<String> {
        self.urls.get(file_id).cloned()
    }
}

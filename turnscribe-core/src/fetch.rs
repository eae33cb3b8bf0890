//! External collaborators: credential acquisition, the conversation
//! fetch, and image download-URL resolution, plus reqwest-backed
//! implementations against the backend REST shape.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ExportError, Result};
use crate::record::ConversationRecord;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Ok(None) means no credential is available.
    async fn token(&self) -> Result<Option<String>>;
}

#[async_trait]
pub trait ConversationFetcher: Send + Sync {
    async fn fetch(&self, conversation_id: &str, token: &str) -> Result<ConversationRecord>;
}

#[async_trait]
pub trait ImageUrlResolver: Send + Sync {
    /// Never fails; None signals an unresolvable image.
    async fn resolve(&self, file_id: &str, conversation_id: &str) -> Option<String>;
}

/// A fixed credential, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

#[async_trait]
impl AuthProvider for StaticToken {
    async fn token(&self) -> Result<Option<String>> {
        Ok(self.0.clone())
    }
}

/// Conversation fetcher against `{base}/backend-api/conversation/{id}`.
pub struct HttpConversationFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConversationFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ConversationFetcher for HttpConversationFetcher {
    async fn fetch(&self, conversation_id: &str, token: &str) -> Result<ConversationRecord> {
        let url = format!("{}/backend-api/conversation/{conversation_id}", self.base_url);
        debug!(%url, "fetching conversation");

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::transport(
                status.as_u16(),
                format!("conversation fetch for {conversation_id}"),
            ));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|err| ExportError::json(format!("conversation {conversation_id}"), err))
    }
}

/// Image resolver against `{base}/backend-api/files/{id}/download`.
pub struct HttpImageResolver {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpImageResolver {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    #[serde(default)]
    download_url: Option<String>,
}

#[async_trait]
impl ImageUrlResolver for HttpImageResolver {
    async fn resolve(&self, file_id: &str, conversation_id: &str) -> Option<String> {
        let url = format!(
            "{}/backend-api/files/{file_id}/download?conversation_id={conversation_id}",
            self.base_url
        );

        let response = match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(file_id, error = %err, "image download request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(file_id, status = %response.status(), "image download rejected");
            return None;
        }

        match response.json::<DownloadResponse>().await {
            Ok(body) => body.download_url,
            Err(err) => {
                warn!(file_id, error = %err, "image download response unreadable");
                None
            }
        }
    }
}

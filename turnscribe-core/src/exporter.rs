//! Pipeline entry point.
//!
//! Owns the process-scoped state the pipeline needs: the memoized
//! credential (cleared on auth failure) and the TTL-bounded,
//! conversation-id-keyed result cache. The conversation fetch is a
//! barrier; extraction is synchronous after it, with the image batch
//! resolving alongside and joined before turn assembly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::assemble::assemble_turns;
use crate::canvas::{reconcile_canvases, CanvasSnapshot};
use crate::error::{ExportError, Result};
use crate::extract::extract_messages;
use crate::fetch::{AuthProvider, ConversationFetcher, ImageUrlResolver};
use crate::images::{collect_image_requests, resolve_images};
use crate::index::TurnIndex;
use crate::reasoning::attach_reasoning;
use crate::record::ConversationRecord;
use crate::render::{render, CopyEntry, ExportMeta, TranscriptEntry};
use crate::timefmt::TimeFormatter;
use crate::view::{DomSnapshot, RenderedView};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// How long a cached result may satisfy a repeat call.
    pub cache_ttl: Duration,
    /// Optional IANA timezone for display timestamps.
    pub timezone: Option<String>,
    /// Host prefix for the conversation permalink.
    pub permalink_base: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            timezone: None,
            permalink_base: "https://chatgpt.com/c".to_string(),
        }
    }
}

/// The three canonical output artifacts plus supporting shapes.
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub markdown: String,
    pub full_transcript: Vec<TranscriptEntry>,
    pub copy_transcript: Vec<CopyEntry>,
    pub flat_transcript: String,
    pub canvases_by_turn: HashMap<String, Vec<CanvasSnapshot>>,
    pub meta_data: ExportMeta,
}

struct CacheEntry {
    at: Instant,
    result: ExportResult,
}

pub struct Exporter<D: DomSnapshot> {
    auth: Arc<dyn AuthProvider>,
    fetcher: Arc<dyn ConversationFetcher>,
    images: Arc<dyn ImageUrlResolver>,
    dom: D,
    options: ExportOptions,
    time: TimeFormatter,
    token: Mutex<Option<String>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl<D: DomSnapshot> Exporter<D> {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        fetcher: Arc<dyn ConversationFetcher>,
        images: Arc<dyn ImageUrlResolver>,
        dom: D,
        options: ExportOptions,
    ) -> Result<Self> {
        let time = TimeFormatter::new(options.timezone.as_deref())?;
        Ok(Self {
            auth,
            fetcher,
            images,
            dom,
            options,
            time,
            token: Mutex::new(None),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Export one conversation. With no explicit id the currently
    /// active conversation is exported. `use_cache` permits serving
    /// and storing cached results; `force_refresh` bypasses a hit.
    #[instrument(skip_all, fields(conversation))]
    pub async fn export(
        &self,
        conversation_id: Option<&str>,
        use_cache: bool,
        force_refresh: bool,
    ) -> Result<ExportResult> {
        let conv_id = conversation_id
            .map(str::to_owned)
            .or_else(|| self.dom.active_conversation())
            .ok_or(ExportError::NoConversation)?;
        tracing::Span::current().record("conversation", conv_id.as_str());

        if use_cache && !force_refresh {
            if let Some(hit) = self.cache_lookup(&conv_id) {
                debug!("serving cached export");
                return Ok(hit);
            }
        }

        let token = self.acquire_token().await?;
        // Fetch barrier: no extraction before the record is complete.
        let record = self.fetcher.fetch(&conv_id, &token).await?;

        // The user may have switched conversations while the fetch
        // was in flight; presenting the result would be wrong.
        if let Some(active) = self.dom.active_conversation() {
            if active != conv_id {
                warn!(fetched = %conv_id, %active, "discarding stale export");
                return Err(ExportError::StaleResult {
                    fetched: conv_id,
                    active,
                });
            }
        }

        let view = self.dom.capture();
        let result = self.build(&conv_id, &record, &view).await;

        if use_cache {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.insert(
                conv_id,
                CacheEntry {
                    at: Instant::now(),
                    result: result.clone(),
                },
            );
        }

        Ok(result)
    }

    fn cache_lookup(&self, conv_id: &str) -> Option<ExportResult> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .get(conv_id)
            .filter(|entry| entry.at.elapsed() < self.options.cache_ttl)
            .map(|entry| entry.result.clone())
    }

    /// Memoized credential; cleared whenever acquisition fails so a
    /// later call starts clean.
    async fn acquire_token(&self) -> Result<String> {
        if let Some(token) = self
            .token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Ok(token);
        }

        match self.auth.token().await {
            Ok(Some(token)) => {
                *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
                Ok(token)
            }
            Ok(None) => {
                *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
                Err(ExportError::Unauthorized)
            }
            Err(err) => {
                *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
                Err(err)
            }
        }
    }

    /// In-memory extraction and rendering. The image batch starts
    /// first and is joined right before turn assembly; everything in
    /// between is synchronous graph work.
    async fn build(
        &self,
        conv_id: &str,
        record: &ConversationRecord,
        view: &RenderedView,
    ) -> ExportResult {
        let index = TurnIndex::build(view);

        let image_requests = collect_image_requests(record, view);
        let images_fut = resolve_images(self.images.as_ref(), conv_id, image_requests);

        let messages = extract_messages(record, &index);
        let canvases = reconcile_canvases(record, &index);
        let reasoning = attach_reasoning(record, &index);

        let images = images_fut.await;

        let turns = assemble_turns(&index, messages, images, canvases.clone(), reasoning);

        let meta = ExportMeta {
            title: record
                .title
                .clone()
                .unwrap_or_else(|| "Conversation".to_string()),
            create_time: self.time.display(record.create_time),
            update_time: self.time.display(record.update_time),
            permalink: format!("{}/{conv_id}", self.options.permalink_base),
        };

        let rendered = render(&meta, &turns);

        debug!(
            turns = turns.len(),
            canvases = canvases.values().map(Vec::len).sum::<usize>(),
            "export assembled"
        );

        ExportResult {
            markdown: rendered.markdown,
            full_transcript: rendered.full_transcript,
            copy_transcript: rendered.copy_transcript,
            flat_transcript: rendered.flat_transcript,
            canvases_by_turn: canvases,
            meta_data: meta,
        }
    }
}

//! Image resolution: asset pointers to downloadable URLs.
//!
//! Marker collection is synchronous; the URL resolutions run as one
//! parallel batch with join-all semantics. A failed resolution yields
//! an entry with no url rather than failing the batch.

use std::collections::HashMap;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ExportError, Result};
use crate::fetch::ImageUrlResolver;
use crate::record::{Content, ConversationRecord};
use crate::view::RenderedView;

/// Asset pointers carry a fixed scheme prefix in parts[0].
const ASSET_SCHEME: &str = "file-service://";

/// A rendered image marker resolved to its backend file id.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub turn_id: String,
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageEntry {
    pub file_id: String,
    /// None signals a failed resolution; the entry is kept so the
    /// turn still records that an image was present.
    pub url: Option<String>,
}

/// Collect the file ids behind every rendered image marker.
/// Per-item parse failures are logged and skipped.
pub fn collect_image_requests(
    record: &ConversationRecord,
    view: &RenderedView,
) -> Vec<ImageRequest> {
    let mut requests = Vec::new();

    for turn in &view.turns {
        for image_id in &turn.image_ids {
            match image_file_id(record, image_id) {
                Ok(file_id) => requests.push(ImageRequest {
                    turn_id: turn.turn_id.clone(),
                    file_id,
                }),
                Err(err) => {
                    warn!(image_id = %image_id, error = %err, "skipping image marker");
                }
            }
        }
    }

    requests
}

fn image_file_id(record: &ConversationRecord, image_id: &str) -> Result<String> {
    let node = record
        .node(image_id)
        .ok_or_else(|| ExportError::item("image", image_id, "not present in node map"))?;
    let message = node
        .message
        .as_ref()
        .ok_or_else(|| ExportError::item("image", image_id, "node carries no message"))?;

    let parts = match &message.content {
        Content::Text { parts } | Content::MultimodalText { parts } => parts,
        _ => {
            return Err(ExportError::item(
                "image",
                image_id,
                "content has no parts",
            ))
        }
    };

    let pointer = parts
        .first()
        .and_then(|part| match part {
            Value::Object(map) => map.get("asset_pointer").and_then(Value::as_str),
            Value::String(text) => Some(text.as_str()),
            _ => None,
        })
        .ok_or_else(|| ExportError::item("image", image_id, "parts[0] is not an asset pointer"))?;

    pointer
        .strip_prefix(ASSET_SCHEME)
        .map(str::to_owned)
        .ok_or_else(|| {
            ExportError::item(
                "image",
                image_id,
                format!("asset pointer '{pointer}' lacks the {ASSET_SCHEME} scheme"),
            )
        })
}

/// Resolve all requests as a single parallel batch, grouped by turn.
pub async fn resolve_images(
    resolver: &dyn ImageUrlResolver,
    conversation_id: &str,
    requests: Vec<ImageRequest>,
) -> HashMap<String, Vec<ImageEntry>> {
    debug!(count = requests.len(), "resolving image batch");

    let urls = join_all(
        requests
            .iter()
            .map(|request| resolver.resolve(&request.file_id, conversation_id)),
    )
    .await;

    let mut by_turn: HashMap<String, Vec<ImageEntry>> = HashMap::new();
    for (request, url) in requests.into_iter().zip(urls) {
        if url.is_none() {
            warn!(file_id = %request.file_id, "image url resolution failed");
        }
        by_turn.entry(request.turn_id).or_default().push(ImageEntry {
            file_id: request.file_id,
            url,
        });
    }

    by_turn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::RenderedTurn;
    use async_trait::async_trait;

    struct FlakyResolver;

    #[async_trait]
    impl ImageUrlResolver for FlakyResolver {
        async fn resolve(&self, file_id: &str, _conversation_id: &str) -> Option<String> {
            if file_id.ends_with("bad") {
                None
            } else {
                Some(format!("https://cdn.example/{file_id}"))
            }
        }
    }

    fn record_with_images() -> ConversationRecord {
        serde_json::from_value(serde_json::json!({
            "mapping": {
                "img-good": {
                    "id": "img-good",
                    "children": [],
                    "message": {
                        "id": "m-good",
                        "author": {"role": "user"},
                        "content": {
                            "content_type": "multimodal_text",
                            "parts": [{"asset_pointer": "file-service://file-ok"}]
                        }
                    }
                },
                "img-bad": {
                    "id": "img-bad",
                    "children": [],
                    "message": {
                        "id": "m-bad",
                        "author": {"role": "user"},
                        "content": {
                            "content_type": "multimodal_text",
                            "parts": [{"asset_pointer": "file-service://file-bad"}]
                        }
                    }
                },
                "img-broken": {
                    "id": "img-broken",
                    "children": [],
                    "message": {
                        "id": "m-broken",
                        "author": {"role": "user"},
                        "content": {"content_type": "text", "parts": []}
                    }
                }
            }
        }))
        .unwrap()
    }

    fn view_with_images() -> RenderedView {
        RenderedView {
            turns: vec![RenderedTurn {
                turn_id: "turn-1".into(),
                message_ids: vec![],
                image_ids: vec!["img-good".into(), "img-bad".into(), "img-broken".into()],
            }],
        }
    }

    #[test]
    fn test_collect_skips_unparseable_markers() {
        let requests = collect_image_requests(&record_with_images(), &view_with_images());
        let ids: Vec<&str> = requests.iter().map(|r| r.file_id.as_str()).collect();
        assert_eq!(ids, vec!["file-ok", "file-bad"]);
    }

    #[tokio::test]
    async fn test_failed_resolution_is_isolated() {
        let requests = collect_image_requests(&record_with_images(), &view_with_images());
        let resolved = resolve_images(&FlakyResolver, "conv-1", requests).await;

        let entries = &resolved["turn-1"];
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].url.as_deref(),
            Some("https://cdn.example/file-ok")
        );
        assert!(entries[1].url.is_none());
    }
}

//! Message extraction: per-message text plus citation records.
//!
//! For each rendered message the pipeline concatenates content parts,
//! substitutes citation spans, strips leftover private-use delimiter
//! characters, and rewrites inline links to reference style with
//! footnote records. A failure on one message is logged and skipped;
//! extraction of siblings continues.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{ExportError, Result};
use crate::index::TurnIndex;
use crate::record::{Content, ConversationRecord, Message};

/// Inline markdown link. The optional leading `!` captures image
/// syntax so it can be left untouched.
static INLINE_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(!?)\[([^\]]*)\]\((https?://[^)\s]+)\)").expect("inline link regex")
});

/// Residual citation delimiters land in the Unicode private-use area.
static PRIVATE_USE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{E000}-\x{F8FF}]").expect("private-use regex"));

/// A numbered footnote-style link, scoped to one message. Ids are
/// 1-based and assigned in first-seen order of the destination URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub id: usize,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedMessage {
    pub id: String,
    pub role: &'static str,
    pub text: String,
    pub references: Vec<Reference>,
}

/// Extract every rendered message, grouped by turn id.
pub fn extract_messages(
    record: &ConversationRecord,
    index: &TurnIndex,
) -> HashMap<String, Vec<ExtractedMessage>> {
    let mut by_turn: HashMap<String, Vec<ExtractedMessage>> = HashMap::new();

    for rendered in index.rendered_messages() {
        match extract_one(record, &rendered.message_id) {
            Ok(Some(message)) => {
                by_turn
                    .entry(rendered.turn_id.clone())
                    .or_default()
                    .push(message);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(message_id = %rendered.message_id, error = %err, "skipping message");
            }
        }
    }

    by_turn
}

fn extract_one(record: &ConversationRecord, message_id: &str) -> Result<Option<ExtractedMessage>> {
    let node = record
        .node(message_id)
        .ok_or_else(|| ExportError::item("message", message_id, "not present in node map"))?;
    let message = node
        .message
        .as_ref()
        .ok_or_else(|| ExportError::item("message", message_id, "node carries no message"))?;

    let Some(text) = message_text(message) else {
        return Ok(None);
    };

    let text = substitute_citations(text, message);
    let text = PRIVATE_USE_RE.replace_all(&text, "").trim().to_string();
    let (text, references) = rewrite_links(&text);

    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(ExtractedMessage {
        id: message.id.clone(),
        role: message.role().as_str(),
        text,
        references,
    }))
}

/// One handler per content variant; anything else is a no-op.
/// Thoughts are handled by the reasoning pass, not here.
fn message_text(message: &Message) -> Option<String> {
    match &message.content {
        Content::Text { parts } | Content::MultimodalText { parts } => {
            Some(join_parts(parts))
        }
        Content::Code { text, .. } => Some(text.clone()),
        Content::UserEditableContext { .. }
        | Content::Thoughts { .. }
        | Content::Other => None,
    }
}

fn join_parts(parts: &[Value]) -> String {
    let mut joined = String::new();
    for part in parts {
        let text = match part {
            Value::String(text) => Some(text.as_str()),
            Value::Object(map) => map.get("text").and_then(Value::as_str),
            _ => None,
        };
        if let Some(text) = text {
            if !joined.is_empty() {
                joined.push('\n');
            }
            joined.push_str(text);
        }
    }
    joined
}

/// Replace each literal citation span with its alt text.
fn substitute_citations(mut text: String, message: &Message) -> String {
    for reference in &message.metadata.content_references {
        if reference.matched_text.is_empty() {
            continue;
        }
        let alt = reference.alt.as_deref().unwrap_or("");
        text = text.replace(&reference.matched_text, alt);
    }
    text
}

/// Rewrite `[label](url)` to `[label][id]`, assigning each distinct
/// url a 1-based id in first-seen order. A repeated url reuses its id.
fn rewrite_links(text: &str) -> (String, Vec<Reference>) {
    let mut references: Vec<Reference> = Vec::new();
    let mut assigned: HashMap<String, usize> = HashMap::new();

    let rewritten = INLINE_LINK_RE.replace_all(text, |caps: &Captures| {
        // Image syntax stays inline.
        if &caps[1] == "!" {
            return caps[0].to_string();
        }
        let label = &caps[2];
        let url = &caps[3];
        let id = match assigned.get(url) {
            Some(id) => *id,
            None => {
                let id = references.len() + 1;
                assigned.insert(url.to_string(), id);
                references.push(Reference {
                    id,
                    url: url.to_string(),
                });
                id
            }
        };
        format!("[{label}][{id}]")
    });

    (rewritten.into_owned(), references)
}

//! Canvas reconciliation: merge chronologically ordered document
//! create/update operations into per-turn snapshots.
//!
//! Two passes over the full node map. Collection finds qualifying
//! (operation, tool) node pairs; resolution sorts them by the tool
//! node's creation time and replays them in order, carrying title and
//! type forward across versions of the same textdoc. Storage order in
//! the map does not guarantee chronology, and an out-of-order replay
//! would attach stale content to the wrong turn.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ExportError, Result};
use crate::index::TurnIndex;
use crate::record::{Content, ConversationRecord, Message, Node, Role};

const CREATE_RECIPIENT: &str = "canmore.create_textdoc";
const UPDATE_RECIPIENT: &str = "canmore.update_textdoc";

/// One resolved canvas version attached to a turn.
#[derive(Debug, Clone, Serialize)]
pub struct CanvasSnapshot {
    pub textdoc_id: String,
    pub version: i64,
    pub title: String,
    pub doc_type: String,
    pub content: String,
}

/// JSON body of a create/update operation message.
#[derive(Debug, Default, Deserialize)]
struct OperationBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    doc_type: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    updates: Vec<OperationUpdate>,
}

#[derive(Debug, Default, Deserialize)]
struct OperationUpdate {
    #[serde(default)]
    replacement: Option<String>,
}

/// Carry-over state per textdoc_id, updated only by operations that
/// resolve successfully.
#[derive(Debug, Default)]
struct CarryOver {
    titles: HashMap<String, String>,
    types: HashMap<String, String>,
}

/// Reconcile every canvas operation in the node map into per-turn
/// snapshot lists. Failed operations are skipped and leave the
/// carry-over tables untouched.
pub fn reconcile_canvases(
    record: &ConversationRecord,
    index: &TurnIndex,
) -> HashMap<String, Vec<CanvasSnapshot>> {
    let mut pairs = collect_operations(record);
    pairs.sort_by(|a, b| {
        let left = tool_create_time(a.1);
        let right = tool_create_time(b.1);
        left.total_cmp(&right)
    });

    let mut carry = CarryOver::default();
    let mut by_turn: HashMap<String, Vec<CanvasSnapshot>> = HashMap::new();

    for (operation, tool) in pairs {
        match resolve_operation(record, index, operation, tool, &mut carry) {
            Ok(Some((turn_id, snapshot))) => {
                by_turn.entry(turn_id).or_default().push(snapshot);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(node_id = %operation.id, error = %err, "skipping canvas operation");
            }
        }
    }

    by_turn
}

/// Pass 1: a node qualifies when its message targets the create or
/// update tool, its single child is tool-authored, and that child
/// carries non-failure canvas metadata.
fn collect_operations(record: &ConversationRecord) -> Vec<(&Node, &Node)> {
    let mut pairs = Vec::new();

    for node in record.mapping.values() {
        let Some(message) = &node.message else {
            continue;
        };
        let Some(recipient) = message.recipient.as_deref() else {
            continue;
        };
        if recipient != CREATE_RECIPIENT && recipient != UPDATE_RECIPIENT {
            continue;
        }
        let [child_id] = node.children.as_slice() else {
            continue;
        };
        let Some(tool) = record.node(child_id) else {
            continue;
        };
        let Some(tool_message) = &tool.message else {
            continue;
        };
        if tool_message.role() != Role::Tool {
            continue;
        }
        let Some(canvas) = &tool_message.metadata.canvas else {
            continue;
        };
        if canvas.is_failure {
            continue;
        }
        pairs.push((node, tool));
    }

    pairs
}

fn tool_create_time(tool: &Node) -> f64 {
    tool.message
        .as_ref()
        .and_then(|message| message.create_time)
        .unwrap_or(0.0)
}

/// Pass 2, one operation: parse the body, resolve type/title/content
/// with carry-over, then attach the snapshot to the owning turn.
/// Returns None when the owner is not part of the rendered view.
fn resolve_operation(
    record: &ConversationRecord,
    index: &TurnIndex,
    operation: &Node,
    tool: &Node,
    carry: &mut CarryOver,
) -> Result<Option<(String, CanvasSnapshot)>> {
    let operation_message = operation
        .message
        .as_ref()
        .ok_or_else(|| ExportError::item("canvas", &operation.id, "operation has no message"))?;
    let tool_message = tool
        .message
        .as_ref()
        .ok_or_else(|| ExportError::item("canvas", &tool.id, "tool node has no message"))?;
    let canvas = tool_message
        .metadata
        .canvas
        .as_ref()
        .ok_or_else(|| ExportError::item("canvas", &tool.id, "tool node has no canvas metadata"))?;

    let body_text = operation_body_text(operation_message)
        .ok_or_else(|| ExportError::item("canvas", &operation.id, "operation has no body"))?;
    let body: OperationBody = serde_json::from_str(body_text)
        .map_err(|err| ExportError::item("canvas", &operation.id, err.to_string()))?;

    let textdoc_id = canvas.textdoc_id.clone();

    let doc_type = canvas
        .textdoc_type
        .clone()
        .or_else(|| body.doc_type.clone())
        .or_else(|| carry.types.get(&textdoc_id).cloned())
        .unwrap_or_else(|| "document".to_string());

    let title = canvas
        .title
        .clone()
        .or_else(|| carry.titles.get(&textdoc_id).cloned())
        .or_else(|| body.name.clone())
        .unwrap_or_else(|| doc_type.clone());

    let content = body
        .content
        .or_else(|| {
            body.updates
                .into_iter()
                .find_map(|update| update.replacement)
        })
        .unwrap_or_default();

    carry.types.insert(textdoc_id.clone(), doc_type.clone());
    carry.titles.insert(textdoc_id.clone(), title.clone());

    let snapshot = CanvasSnapshot {
        textdoc_id,
        version: canvas.version,
        title,
        doc_type,
        content,
    };

    let owner = owner_of(record, tool);
    let Some(owner_message) = owner.message.as_ref() else {
        return Ok(None);
    };
    let Some(turn_id) = index.turn_for_message(&owner.id).or_else(|| {
        index.turn_for_message(&owner_message.id)
    }) else {
        return Ok(None);
    };

    Ok(Some((turn_id.to_string(), snapshot)))
}

/// The operation body lives in the operation message's content: code
/// text for tool calls, or the first text part.
fn operation_body_text(message: &Message) -> Option<&str> {
    match &message.content {
        Content::Code { text, .. } => Some(text.as_str()),
        Content::Text { parts } => parts.first().and_then(|part| part.as_str()),
        _ => None,
    }
}

/// Walk forward through single-child links from the tool node until
/// an assistant-authored node addressed to "all" (the user-visible
/// reply) or the chain ends.
fn owner_of<'a>(record: &'a ConversationRecord, tool: &'a Node) -> &'a Node {
    let mut current = tool;
    loop {
        let [child_id] = current.children.as_slice() else {
            return current;
        };
        let Some(child) = record.node(child_id) else {
            return current;
        };
        current = child;
        if let Some(message) = &current.message {
            if message.role() == Role::Assistant && message.addressed_to_all() {
                return current;
            }
        }
    }
}

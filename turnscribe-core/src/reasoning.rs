//! Reasoning attachment: hidden "thoughts" nodes are tied to the
//! final visible reply they explain via a shared request id.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::index::TurnIndex;
use crate::record::{Content, ConversationRecord, Node, Role, Thought};

#[derive(Debug, Clone, Serialize)]
pub struct ReasoningEntry {
    /// The final-channel assistant message this reasoning explains.
    pub message_id: String,
    pub thoughts: Vec<String>,
}

/// Scan the full node map for thoughts nodes and attach each to the
/// turn of its matching final-channel assistant reply. Unmatched or
/// empty thoughts contribute nothing.
pub fn attach_reasoning(
    record: &ConversationRecord,
    index: &TurnIndex,
) -> HashMap<String, Vec<ReasoningEntry>> {
    let mut candidates: Vec<&Node> = record
        .mapping
        .values()
        .filter(|node| {
            matches!(
                node.message.as_ref().map(|m| &m.content),
                Some(Content::Thoughts { thoughts }) if !thoughts.is_empty()
            )
        })
        .collect();
    // Map storage order is arbitrary; replay in creation order so
    // entries within a turn read top to bottom.
    candidates.sort_by(|a, b| node_create_time(a).total_cmp(&node_create_time(b)));

    let mut by_turn: HashMap<String, Vec<ReasoningEntry>> = HashMap::new();

    for node in candidates {
        let Some(message) = node.message.as_ref() else {
            continue;
        };
        let Some(request_id) = message.metadata.request_id.as_deref() else {
            debug!(node_id = %node.id, "thoughts node without request id");
            continue;
        };
        let Some(reply) = find_final_reply(record, request_id) else {
            debug!(node_id = %node.id, request_id, "no final reply for thoughts");
            continue;
        };
        let Some(turn_id) = index
            .turn_for_message(&reply.id)
            .or_else(|| reply.message.as_ref().and_then(|m| index.turn_for_message(&m.id)))
        else {
            continue;
        };

        let thoughts = match &message.content {
            Content::Thoughts { thoughts } => thoughts.iter().map(thought_text).collect(),
            _ => Vec::new(),
        };

        let message_id = reply
            .message
            .as_ref()
            .map(|m| m.id.clone())
            .unwrap_or_else(|| reply.id.clone());
        by_turn
            .entry(turn_id.to_string())
            .or_default()
            .push(ReasoningEntry {
                message_id,
                thoughts,
            });
    }

    by_turn
}

fn node_create_time(node: &Node) -> f64 {
    node.message
        .as_ref()
        .and_then(|message| message.create_time)
        .unwrap_or(0.0)
}

/// An assistant-authored node with matching request id on the "final"
/// channel is the message the reasoning explains.
fn find_final_reply<'a>(record: &'a ConversationRecord, request_id: &str) -> Option<&'a Node> {
    record.mapping.values().find(|node| {
        node.message.as_ref().is_some_and(|message| {
            message.role() == Role::Assistant
                && message.metadata.channel.as_deref() == Some("final")
                && message.metadata.request_id.as_deref() == Some(request_id)
        })
    })
}

fn thought_text(thought: &Thought) -> String {
    if thought.content.is_empty() {
        thought.summary.clone()
    } else {
        thought.content.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{RenderedTurn, RenderedView};
    use serde_json::json;

    fn record() -> ConversationRecord {
        serde_json::from_value(json!({
            "mapping": {
                "think-1": {
                    "id": "think-1",
                    "children": ["final-1"],
                    "message": {
                        "id": "think-msg-1",
                        "author": {"role": "assistant"},
                        "create_time": 1.0,
                        "content": {
                            "content_type": "thoughts",
                            "thoughts": [{"summary": "sum", "content": "step one"}]
                        },
                        "metadata": {"request_id": "req-1"}
                    }
                },
                "final-1": {
                    "id": "final-1",
                    "children": [],
                    "message": {
                        "id": "final-1",
                        "author": {"role": "assistant"},
                        "create_time": 2.0,
                        "content": {"content_type": "text", "parts": ["answer"]},
                        "metadata": {"request_id": "req-1", "channel": "final"}
                    }
                },
                "orphan": {
                    "id": "orphan",
                    "children": [],
                    "message": {
                        "id": "orphan",
                        "author": {"role": "assistant"},
                        "create_time": 3.0,
                        "content": {
                            "content_type": "thoughts",
                            "thoughts": [{"summary": "", "content": "dangling"}]
                        },
                        "metadata": {"request_id": "req-unmatched"}
                    }
                }
            }
        }))
        .unwrap()
    }

    fn index() -> TurnIndex {
        TurnIndex::build(&RenderedView {
            turns: vec![RenderedTurn {
                turn_id: "turn-1".into(),
                message_ids: vec!["final-1".into()],
                image_ids: vec![],
            }],
        })
    }

    #[test]
    fn test_reasoning_attaches_to_final_reply() {
        let by_turn = attach_reasoning(&record(), &index());

        let entries = &by_turn["turn-1"];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message_id, "final-1");
        assert_eq!(entries[0].thoughts, vec!["step one"]);
    }

    #[test]
    fn test_unmatched_thoughts_contribute_nothing() {
        let by_turn = attach_reasoning(&record(), &index());
        let total: usize = by_turn.values().map(Vec::len).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_empty_thoughts_skipped() {
        let record: ConversationRecord = serde_json::from_value(json!({
            "mapping": {
                "t": {
                    "id": "t",
                    "children": [],
                    "message": {
                        "id": "t",
                        "author": {"role": "assistant"},
                        "content": {"content_type": "thoughts", "thoughts": []},
                        "metadata": {"request_id": "req-1"}
                    }
                }
            }
        }))
        .unwrap();
        assert!(attach_reasoning(&record, &index()).is_empty());
    }
}

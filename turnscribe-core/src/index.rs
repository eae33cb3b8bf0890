//! Turn indexing over the rendered view.
//!
//! The index is the export's source of truth for scope and order:
//! turn ids come from the rendered document, never from the backend
//! map, so hidden branches and regenerated replies stay out of the
//! output.

use std::collections::HashMap;

use crate::view::RenderedView;

/// A rendered message marker: which turn a message id appeared under.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub turn_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct TurnIndex {
    turn_order: Vec<String>,
    rendered: Vec<RenderedMessage>,
    message_to_turn: HashMap<String, String>,
}

impl TurnIndex {
    pub fn build(view: &RenderedView) -> Self {
        let mut turn_order = Vec::with_capacity(view.turns.len());
        let mut rendered = Vec::new();
        let mut message_to_turn = HashMap::new();

        for turn in &view.turns {
            turn_order.push(turn.turn_id.clone());
            for message_id in &turn.message_ids {
                rendered.push(RenderedMessage {
                    turn_id: turn.turn_id.clone(),
                    message_id: message_id.clone(),
                });
                message_to_turn.insert(message_id.clone(), turn.turn_id.clone());
            }
        }

        Self {
            turn_order,
            rendered,
            message_to_turn,
        }
    }

    /// Visible turn ids in document order.
    pub fn turn_order(&self) -> &[String] {
        &self.turn_order
    }

    /// All rendered {turn, message} pairs in document order.
    pub fn rendered_messages(&self) -> &[RenderedMessage] {
        &self.rendered
    }

    pub fn turn_for_message(&self, message_id: &str) -> Option<&str> {
        self.message_to_turn.get(message_id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::RenderedTurn;

    fn view() -> RenderedView {
        RenderedView {
            turns: vec![
                RenderedTurn {
                    turn_id: "turn-a".into(),
                    message_ids: vec!["m1".into(), "m2".into()],
                    image_ids: vec![],
                },
                RenderedTurn {
                    turn_id: "turn-b".into(),
                    message_ids: vec!["m3".into()],
                    image_ids: vec!["img-1".into()],
                },
            ],
        }
    }

    #[test]
    fn test_turn_order_matches_document() {
        let index = TurnIndex::build(&view());
        assert_eq!(index.turn_order(), &["turn-a", "turn-b"]);
    }

    #[test]
    fn test_message_lookup() {
        let index = TurnIndex::build(&view());
        assert_eq!(index.turn_for_message("m2"), Some("turn-a"));
        assert_eq!(index.turn_for_message("m3"), Some("turn-b"));
        assert_eq!(index.turn_for_message("hidden"), None);
    }

    #[test]
    fn test_rendered_pairs_preserve_order() {
        let index = TurnIndex::build(&view());
        let ids: Vec<&str> = index
            .rendered_messages()
            .iter()
            .map(|m| m.message_id.as_str())
            .collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }
}

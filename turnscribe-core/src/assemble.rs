//! Turn assembly: join per-turn extraction results into ordered
//! turn records. Order comes from the rendered view, nothing else.

use std::collections::HashMap;

use serde::Serialize;

use crate::canvas::CanvasSnapshot;
use crate::extract::ExtractedMessage;
use crate::images::ImageEntry;
use crate::index::TurnIndex;
use crate::reasoning::ReasoningEntry;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnRecord {
    pub id: String,
    pub messages: Vec<ExtractedMessage>,
    pub images: Vec<ImageEntry>,
    pub canvases: Vec<CanvasSnapshot>,
    pub reasoning: Vec<ReasoningEntry>,
}

pub fn assemble_turns(
    index: &TurnIndex,
    mut messages: HashMap<String, Vec<ExtractedMessage>>,
    mut images: HashMap<String, Vec<ImageEntry>>,
    mut canvases: HashMap<String, Vec<CanvasSnapshot>>,
    mut reasoning: HashMap<String, Vec<ReasoningEntry>>,
) -> Vec<TurnRecord> {
    index
        .turn_order()
        .iter()
        .map(|turn_id| TurnRecord {
            id: turn_id.clone(),
            messages: messages.remove(turn_id).unwrap_or_default(),
            images: images.remove(turn_id).unwrap_or_default(),
            canvases: canvases.remove(turn_id).unwrap_or_default(),
            reasoning: reasoning.remove(turn_id).unwrap_or_default(),
        })
        .collect()
}

//! Rendered-view access: which turns, messages, and images are
//! actually on screen. The backend graph can contain far more nodes
//! than are rendered; only the rendered set defines export scope.

use serde::{Deserialize, Serialize};

/// Ordered snapshot of the rendered document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderedView {
    #[serde(default)]
    pub turns: Vec<RenderedTurn>,
}

/// One rendered turn: its id plus the message and image node ids
/// under it, in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedTurn {
    pub turn_id: String,
    #[serde(default)]
    pub message_ids: Vec<String>,
    #[serde(default)]
    pub image_ids: Vec<String>,
}

/// Read-only access to the currently rendered conversation.
///
/// `active_conversation` is re-read after the backend fetch completes
/// to detect a conversation switch mid-flight.
pub trait DomSnapshot: Send + Sync {
    fn active_conversation(&self) -> Option<String>;
    fn capture(&self) -> RenderedView;
}

/// A pre-recorded snapshot, deserializable from JSON. Used by the CLI
/// for offline exports and by tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticSnapshot {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub view: RenderedView,
}

impl DomSnapshot for StaticSnapshot {
    fn active_conversation(&self) -> Option<String> {
        self.conversation_id.clone()
    }

    fn capture(&self) -> RenderedView {
        self.view.clone()
    }
}

//! Backend conversation record: an id-indexed node map plus metadata.
//!
//! The backend links nodes by id, not by reference, and the map may
//! hold hidden or regenerated branches that are never rendered. The
//! model mirrors that shape: lookups go through [`ConversationRecord::node`]
//! and nothing here materializes an object graph.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
    Other,
}

impl Role {
    pub fn from_export_value(value: &str) -> Role {
        match value {
            "user" | "human" => Role::User,
            "assistant" => Role::Assistant,
            "tool" | "function" => Role::Tool,
            "system" | "developer" => Role::System,
            _ => Role::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
            Role::Other => "other",
        }
    }
}

/// Raw conversation payload as fetched from the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationRecord {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub update_time: Option<f64>,
    #[serde(default)]
    pub mapping: HashMap<String, Node>,
}

impl ConversationRecord {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.mapping.get(id)
    }

    /// The single node without a parent. The backend guarantees a
    /// single-root tree; a malformed map yields None.
    pub fn root_id(&self) -> Option<&str> {
        self.mapping
            .values()
            .find(|node| node.parent.is_none())
            .map(|node| node.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub create_time: Option<f64>,
    pub content: Content,
    #[serde(default)]
    pub metadata: MessageMeta,
    /// "all" for user-visible replies; a tool target for side-effects.
    #[serde(default)]
    pub recipient: Option<String>,
}

impl Message {
    pub fn role(&self) -> Role {
        Role::from_export_value(&self.author.role)
    }

    /// Whether this message is a user-visible reply (addressed to "all").
    pub fn addressed_to_all(&self) -> bool {
        self.recipient.as_deref().map_or(true, |r| r == "all")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub role: String,
}

/// Typed message content, tagged by the backend's `content_type`.
/// Unknown content types deserialize to the no-op `Other` variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum Content {
    Text {
        #[serde(default)]
        parts: Vec<Value>,
    },
    MultimodalText {
        #[serde(default)]
        parts: Vec<Value>,
    },
    Thoughts {
        #[serde(default)]
        thoughts: Vec<Thought>,
    },
    Code {
        #[serde(default)]
        text: String,
        #[serde(default)]
        language: Option<String>,
    },
    UserEditableContext {
        #[serde(default)]
        user_instructions: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thought {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageMeta {
    #[serde(default)]
    pub content_references: Vec<ContentReference>,
    #[serde(default)]
    pub canvas: Option<CanvasMeta>,
    #[serde(default)]
    pub attachments: Vec<Value>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

/// A citation span: `matched_text` appears literally in the message
/// body and is replaced by `alt` during extraction.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentReference {
    #[serde(default)]
    pub matched_text: String,
    #[serde(default)]
    pub alt: Option<String>,
}

/// Canvas operation descriptor carried on the tool-authored child of
/// a create/update operation node.
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasMeta {
    pub textdoc_id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub textdoc_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_failure: bool,
}

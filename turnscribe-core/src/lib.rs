//! Conversation-export transformation pipeline: a raw hierarchical
//! conversation record plus the currently rendered view become a
//! self-contained Markdown document and two structured transcripts.

pub mod assemble;
pub mod canvas;
pub mod error;
pub mod exporter;
pub mod extract;
pub mod fetch;
pub mod images;
pub mod index;
pub mod reasoning;
pub mod record;
pub mod render;
pub mod timefmt;
pub mod view;

pub use assemble::{assemble_turns, TurnRecord};
pub use canvas::{reconcile_canvases, CanvasSnapshot};
pub use error::{ExportError, Result};
pub use exporter::{ExportOptions, ExportResult, Exporter};
pub use extract::{extract_messages, ExtractedMessage, Reference};
pub use fetch::{
    AuthProvider, ConversationFetcher, HttpConversationFetcher, HttpImageResolver,
    ImageUrlResolver, StaticToken,
};
pub use images::{collect_image_requests, resolve_images, ImageEntry};
pub use index::TurnIndex;
pub use reasoning::{attach_reasoning, ReasoningEntry};
pub use record::{ConversationRecord, Message, Node, Role};
pub use render::{render, CopyEntry, ExportMeta, RenderedExport, TranscriptEntry};
pub use timefmt::TimeFormatter;
pub use view::{DomSnapshot, RenderedTurn, RenderedView, StaticSnapshot};

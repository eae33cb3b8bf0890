//! Property tests for the rendered Markdown document.

use proptest::prelude::*;

use turnscribe_core::render::{render, ExportMeta};
use turnscribe_core::{CanvasSnapshot, ExtractedMessage, TurnRecord};

fn turn_with(text: String, canvas_content: String) -> TurnRecord {
    TurnRecord {
        id: "t1".to_string(),
        messages: vec![ExtractedMessage {
            id: "m1".to_string(),
            role: "assistant",
            text,
            references: vec![],
        }],
        canvases: vec![CanvasSnapshot {
            textdoc_id: "doc".to_string(),
            version: 1,
            title: "Doc".to_string(),
            doc_type: "code/python".to_string(),
            content: canvas_content,
        }],
        ..Default::default()
    }
}

proptest! {
    /// The fence count of the rendered document is always even, no
    /// matter how malformed the embedded content is.
    #[test]
    fn fence_count_is_even(
        text in ".{0,200}",
        canvas in proptest::string::string_regex("(`|a|\n){0,60}").unwrap(),
    ) {
        let meta = ExportMeta {
            title: "T".to_string(),
            ..Default::default()
        };
        let rendered = render(&meta, &[turn_with(text, canvas)]);
        prop_assert_eq!(rendered.markdown.matches("```").count() % 2, 0);
    }
}

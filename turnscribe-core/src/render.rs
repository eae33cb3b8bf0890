//! Rendering: turn records into a Markdown document and two
//! structured transcript shapes.

use serde::Serialize;

use crate::assemble::TurnRecord;
use crate::canvas::CanvasSnapshot;

/// Header fields for the Markdown document and the export metadata.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportMeta {
    pub title: String,
    pub create_time: String,
    pub update_time: String,
    pub permalink: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyEntry {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedExport {
    pub markdown: String,
    pub full_transcript: Vec<TranscriptEntry>,
    pub copy_transcript: Vec<CopyEntry>,
    pub flat_transcript: String,
}

/// A turn with any reasoning, canvas, or image entries is an
/// assistant turn; otherwise the first message decides.
fn turn_role(turn: &TurnRecord) -> &'static str {
    if !turn.reasoning.is_empty() || !turn.canvases.is_empty() || !turn.images.is_empty() {
        return "assistant";
    }
    match turn.messages.first() {
        Some(message) => match message.role {
            "user" => "user",
            "tool" => "tool",
            "system" => "system",
            _ => "assistant",
        },
        None => "user",
    }
}

pub fn render(meta: &ExportMeta, turns: &[TurnRecord]) -> RenderedExport {
    let mut markdown = String::new();
    markdown.push_str(&format!("# {}\n\n", meta.title));
    if !meta.permalink.is_empty() {
        markdown.push_str(&format!("{}\n\n", meta.permalink));
    }
    if !meta.create_time.is_empty() {
        markdown.push_str(&format!("Created: {}\n", meta.create_time));
    }
    if !meta.update_time.is_empty() {
        markdown.push_str(&format!("Updated: {}\n", meta.update_time));
    }
    markdown.push('\n');

    let mut full_transcript = Vec::with_capacity(turns.len());
    let mut copy_transcript = Vec::with_capacity(turns.len());

    for turn in turns {
        let role = turn_role(turn);

        let heading = if role == "user" {
            "## You Said:"
        } else {
            "## ChatGPT Said:"
        };
        markdown.push_str(heading);
        markdown.push_str("\n\n");
        let body_md = turn_body(turn, ReasoningStyle::Collapsible);
        if !body_md.is_empty() {
            markdown.push_str(&body_md);
            markdown.push_str("\n\n");
        }

        full_transcript.push(TranscriptEntry {
            role: role.to_string(),
            content: turn_body(turn, ReasoningStyle::Delimited),
        });

        copy_transcript.push(CopyEntry {
            id: turn.id.clone(),
            content: messages_only(turn),
        });
    }

    // Defensive repair for malformed embedded code: an odd number of
    // fence markers would leak the rest of the document into a block.
    if markdown.matches("```").count() % 2 != 0 {
        markdown.push_str("\n```\n");
    }

    let flat_transcript = full_transcript
        .iter()
        .map(|entry| format!("{}:\n{}", entry.role, entry.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    RenderedExport {
        markdown,
        full_transcript,
        copy_transcript,
        flat_transcript,
    }
}

#[derive(Clone, Copy)]
enum ReasoningStyle {
    /// `<details>` block for the Markdown document.
    Collapsible,
    /// Plain `[reasoning]` / `[/reasoning]` pair for transcripts.
    Delimited,
}

/// Shared content order: reasoning, message bodies with reference
/// footnotes, images, canvases.
fn turn_body(turn: &TurnRecord, style: ReasoningStyle) -> String {
    let mut sections: Vec<String> = Vec::new();

    for entry in &turn.reasoning {
        let thoughts = entry.thoughts.join("\n\n");
        let block = match style {
            ReasoningStyle::Collapsible => format!(
                "<details>\n<summary>Reasoning</summary>\n\n{thoughts}\n\n</details>"
            ),
            ReasoningStyle::Delimited => format!("[reasoning]\n{thoughts}\n[/reasoning]"),
        };
        sections.push(block);
    }

    for message in &turn.messages {
        let mut body = message.text.clone();
        if !message.references.is_empty() {
            body.push_str("\n\n");
            body.push_str(
                &message
                    .references
                    .iter()
                    .map(|reference| format!("[{}]: {}", reference.id, reference.url))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }
        sections.push(body);
    }

    for image in &turn.images {
        if let Some(url) = &image.url {
            sections.push(format!("![image]({url})"));
        }
    }

    for canvas in &turn.canvases {
        sections.push(render_canvas(canvas));
    }

    sections.join("\n\n")
}

fn messages_only(turn: &TurnRecord) -> String {
    turn.messages
        .iter()
        .map(|message| message.text.clone())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_canvas(canvas: &CanvasSnapshot) -> String {
    let lang = canvas_language(&canvas.doc_type);
    format!(
        "**{}** (v{})\n\n```{}\n{}\n```",
        canvas.title, canvas.version, lang, canvas.content
    )
}

/// Language tag from the slash-delimited subtype segment of the
/// canvas type. React subtypes render as typescript.
fn canvas_language(doc_type: &str) -> &str {
    if doc_type == "document" {
        return "markdown";
    }
    let subtype = doc_type.rsplit('/').next().unwrap_or(doc_type);
    if subtype.contains("react") {
        "typescript"
    } else {
        subtype
    }
}

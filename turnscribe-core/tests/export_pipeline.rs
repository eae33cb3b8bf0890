//! End-to-end pipeline tests over an in-memory backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use turnscribe_core::{
    ConversationFetcher, ConversationRecord, DomSnapshot, ExportError,
    ExportOptions, Exporter, ImageUrlResolver, RenderedView, Result, StaticSnapshot, StaticToken,
};

struct RecordFetcher {
    record: ConversationRecord,
    calls: AtomicUsize,
}

impl RecordFetcher {
    fn new(record: ConversationRecord) -> Arc<Self> {
        Arc::new(Self {
            record,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ConversationFetcher for RecordFetcher {
    async fn fetch(&self, _conversation_id: &str, _token: &str) -> Result<ConversationRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.record.clone())
    }
}

struct NoImages;

#[async_trait]
impl ImageUrlResolver for NoImages {
    async fn resolve(&self, _file_id: &str, _conversation_id: &str) -> Option<String> {
        None
    }
}

/// Reports a different active conversation on every read, simulating
/// the user switching away mid-fetch.
struct SwitchingSnapshot {
    ids: Mutex<Vec<String>>,
}

impl DomSnapshot for SwitchingSnapshot {
    fn active_conversation(&self) -> Option<String> {
        self.ids.lock().unwrap().pop()
    }

    fn capture(&self) -> RenderedView {
        RenderedView::default()
    }
}

fn two_turn_record() -> ConversationRecord {
    serde_json::from_value(json!({
        "conversation_id": "conv-1",
        "title": "Greetings",
        "create_time": 1700000000.0,
        "update_time": 1700000600.0,
        "mapping": {
            "root": {"id": "root", "children": ["u1"]},
            "u1": {
                "id": "u1",
                "parent": "root",
                "children": ["think"],
                "message": {
                    "id": "u1",
                    "author": {"role": "user"},
                    "create_time": 1700000001.0,
                    "content": {"content_type": "text", "parts": ["Hello"]}
                }
            },
            "think": {
                "id": "think",
                "parent": "u1",
                "children": ["a1"],
                "message": {
                    "id": "think",
                    "author": {"role": "assistant"},
                    "create_time": 1700000002.0,
                    "content": {
                        "content_type": "thoughts",
                        "thoughts": [{"summary": "weigh options", "content": "considering a link"}]
                    },
                    "metadata": {"request_id": "req-1"}
                }
            },
            "a1": {
                "id": "a1",
                "parent": "think",
                "children": [],
                "message": {
                    "id": "a1",
                    "author": {"role": "assistant"},
                    "create_time": 1700000003.0,
                    "content": {"content_type": "text", "parts": ["see [x](http://e.com)"]},
                    "metadata": {"request_id": "req-1", "channel": "final"}
                }
            },
            "broken": {
                "id": "broken",
                "parent": "root",
                "children": []
            }
        }
    }))
    .unwrap()
}

fn two_turn_snapshot() -> StaticSnapshot {
    serde_json::from_value(json!({
        "conversation_id": "conv-1",
        "view": {
            "turns": [
                {"turn_id": "turn-a", "message_ids": ["u1", "broken"]},
                {"turn_id": "turn-b", "message_ids": ["a1"]}
            ]
        }
    }))
    .unwrap()
}

fn exporter(
    snapshot: StaticSnapshot,
    fetcher: Arc<RecordFetcher>,
) -> Exporter<StaticSnapshot> {
    Exporter::new(
        Arc::new(StaticToken(Some("tok".into()))),
        fetcher,
        Arc::new(NoImages),
        snapshot,
        ExportOptions {
            timezone: Some("UTC".into()),
            ..Default::default()
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_end_to_end_two_turns() {
    let fetcher = RecordFetcher::new(two_turn_record());
    let exporter = exporter(two_turn_snapshot(), fetcher);

    let result = exporter.export(None, false, false).await.unwrap();

    // Markdown artifact
    assert!(result.markdown.contains("# Greetings"));
    assert!(result.markdown.contains("https://chatgpt.com/c/conv-1"));
    assert!(result.markdown.contains("## You Said:"));
    assert!(result.markdown.contains("Hello"));
    assert!(result.markdown.contains("## ChatGPT Said:"));
    assert!(result.markdown.contains("<summary>Reasoning</summary>"));
    assert!(result.markdown.contains("see [x][1]"));
    assert!(result.markdown.contains("[1]: http://e.com"));
    assert_eq!(result.markdown.matches("```").count() % 2, 0);

    // Transcripts
    assert_eq!(result.full_transcript.len(), 2);
    assert_eq!(result.full_transcript[0].role, "user");
    assert_eq!(result.full_transcript[1].role, "assistant");
    assert!(result.full_transcript[1].content.contains("[reasoning]"));

    assert_eq!(result.copy_transcript.len(), 2);
    assert_eq!(result.copy_transcript[0].id, "turn-a");
    assert_eq!(result.copy_transcript[0].content, "Hello");
    assert!(!result.copy_transcript[1].content.contains("reasoning"));

    // Metadata is localized display text
    assert_eq!(result.meta_data.create_time, "2023-11-14 22:13:20 UTC");
    assert_eq!(result.meta_data.permalink, "https://chatgpt.com/c/conv-1");
}

#[tokio::test]
async fn test_turn_scope_is_rendered_view() {
    // The node map holds a hidden branch node never rendered; output
    // turns must match the rendered view exactly.
    let fetcher = RecordFetcher::new(two_turn_record());
    let exporter = exporter(two_turn_snapshot(), fetcher);

    let result = exporter.export(None, false, false).await.unwrap();
    let ids: Vec<&str> = result
        .copy_transcript
        .iter()
        .map(|entry| entry.id.as_str())
        .collect();
    assert_eq!(ids, vec!["turn-a", "turn-b"]);
}

#[tokio::test]
async fn test_malformed_message_does_not_fail_export() {
    // "broken" is rendered under turn-a but carries no message; the
    // export still succeeds with everything else intact.
    let fetcher = RecordFetcher::new(two_turn_record());
    let exporter = exporter(two_turn_snapshot(), fetcher);

    let result = exporter.export(None, false, false).await.unwrap();
    assert!(result.markdown.contains("Hello"));
    assert!(result.markdown.contains("see [x][1]"));
}

#[tokio::test]
async fn test_cache_short_circuits_repeat_call() {
    let fetcher = RecordFetcher::new(two_turn_record());
    let exporter = exporter(two_turn_snapshot(), Arc::clone(&fetcher));

    let first = exporter.export(None, true, false).await.unwrap();
    let second = exporter.export(None, true, false).await.unwrap();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.markdown, second.markdown);
    assert_eq!(first.flat_transcript, second.flat_transcript);
    assert_eq!(first.full_transcript, second.full_transcript);

    // Force-refresh bypasses the cache.
    exporter.export(None, true, true).await.unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_zero_ttl_cache_expires() {
    let fetcher = RecordFetcher::new(two_turn_record());
    let exporter = Exporter::new(
        Arc::new(StaticToken(Some("tok".into()))),
        fetcher.clone(),
        Arc::new(NoImages),
        two_turn_snapshot(),
        ExportOptions {
            cache_ttl: Duration::ZERO,
            ..Default::default()
        },
    )
    .unwrap();

    exporter.export(None, true, false).await.unwrap();
    exporter.export(None, true, false).await.unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_credential_is_fatal() {
    let fetcher = RecordFetcher::new(two_turn_record());
    let exporter = Exporter::new(
        Arc::new(StaticToken(None)),
        fetcher.clone(),
        Arc::new(NoImages),
        two_turn_snapshot(),
        ExportOptions::default(),
    )
    .unwrap();

    let err = exporter.export(None, false, false).await.unwrap_err();
    assert!(matches!(err, ExportError::Unauthorized));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_conversation_switch_discards_result() {
    // First read resolves the id to export; the re-read after the
    // fetch sees a different conversation.
    let snapshot = SwitchingSnapshot {
        ids: Mutex::new(vec!["conv-2".into(), "conv-1".into()]),
    };
    let fetcher = RecordFetcher::new(two_turn_record());
    let exporter = Exporter::new(
        Arc::new(StaticToken(Some("tok".into()))),
        fetcher.clone(),
        Arc::new(NoImages),
        snapshot,
        ExportOptions::default(),
    )
    .unwrap();

    let err = exporter.export(None, false, false).await.unwrap_err();
    match err {
        ExportError::StaleResult { fetched, active } => {
            assert_eq!(fetched, "conv-1");
            assert_eq!(active, "conv-2");
        }
        other => panic!("expected stale result, got {other}"),
    }
}

#[tokio::test]
async fn test_no_conversation_available() {
    let fetcher = RecordFetcher::new(two_turn_record());
    let exporter = Exporter::new(
        Arc::new(StaticToken(Some("tok".into()))),
        fetcher,
        Arc::new(NoImages),
        StaticSnapshot::default(),
        ExportOptions::default(),
    )
    .unwrap();

    let err = exporter.export(None, false, false).await.unwrap_err();
    assert!(matches!(err, ExportError::NoConversation));
}

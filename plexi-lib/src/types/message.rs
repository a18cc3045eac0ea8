//! Decoded SSE messages and the answer content they carry.
//!
//! The service sends a message per SSE frame; each one is a full
//! snapshot of the answer so far, not a delta. Fields routinely come
//! and go between frames, so everything deserializes with defaults and
//! unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// One decoded message from the answer stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SseMessage {
    /// Server-side identifier of the thread
    #[serde(default)]
    pub backend_uuid: Option<String>,
    /// Server-side identifier of the conversation context
    #[serde(default)]
    pub context_uuid: Option<String>,
    /// Identifier of this entry within the thread
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub frontend_context_uuid: Option<String>,
    /// Model that produced the answer
    #[serde(default)]
    pub display_model: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    /// URL slug of the thread on the web frontend
    #[serde(default)]
    pub thread_url_slug: Option<String>,
    /// Progress indicator, e.g. `pending` or `completed`
    #[serde(default)]
    pub status: Option<String>,
    /// Whether the answer text has finished generating
    #[serde(default)]
    pub text_completed: bool,
    /// Content blocks; the answer text and web results live here
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// Set on the last message of the stream
    #[serde(default)]
    pub final_sse_message: bool,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub read_write_token: Option<String>,
}

impl SseMessage {
    /// Deserialize a decoded SSE frame into a message.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::JsonError`](crate::ErrorKind::JsonError) if
    /// the value does not have the expected shape.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// The answer text of this snapshot, if any.
    ///
    /// The service has shipped the text both directly on the `ask_text`
    /// block and nested under `markdown_block`; both shapes are
    /// accepted.
    #[must_use]
    pub fn answer_text(&self) -> Option<&str> {
        self.blocks
            .iter()
            .find(|block| block.intended_usage == "ask_text")
            .and_then(Block::text)
    }

    /// The web results cited by this snapshot, empty until the service
    /// sends them.
    #[must_use]
    pub fn web_results(&self) -> Vec<WebResult> {
        self.blocks
            .iter()
            .filter(|block| block.intended_usage == "web_results")
            .filter_map(|block| block.content.get("web_result_block"))
            .filter_map(|inner| inner.get("web_results"))
            .filter_map(|results| serde_json::from_value(results.clone()).ok())
            .next()
            .unwrap_or_default()
    }
}

/// One content block of a message. The service distinguishes blocks by
/// `intended_usage`; the rest of the shape varies per kind, so it is
/// kept as raw JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    /// Block kind, e.g. `ask_text` or `web_results`
    #[serde(default)]
    pub intended_usage: String,
    /// Kind-specific payload
    #[serde(flatten)]
    pub content: serde_json::Map<String, Value>,
}

impl Block {
    /// Text payload of this block, whichever shape it arrived in.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content
            .get("answer")
            .or_else(|| self.content.get("markdown_block")?.get("answer"))
            .and_then(Value::as_str)
    }
}

/// A single cited web source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    /// Page title
    #[serde(default)]
    pub name: String,
    /// Page URL
    #[serde(default)]
    pub url: String,
    /// Short excerpt shown as citation context
    #[serde(default)]
    pub snippet: String,
    /// Publication timestamp, when the service knows it
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A completed answer assembled from the stream, ready for rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Answer {
    /// Final answer text
    pub text: String,
    /// Cited sources, in the order the service listed them
    pub references: Vec<WebResult>,
}

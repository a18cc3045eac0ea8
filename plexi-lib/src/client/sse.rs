//! Incremental decoder for SSE (Server-Sent Events) frames.
//!
//! The answer endpoint responds with a stream of blocks:
//!
//! ```text
//! event: message
//! data: {json}
//!
//! event: message
//! data: {json}
//! ```
//!
//! A blank line terminates a frame. `data:` may repeat within one
//! frame; the payload lines are joined with `\n` before JSON parsing.

use serde_json::Value;

use crate::{ErrorKind, Result};

/// Assembles SSE lines into decoded JSON messages.
///
/// Feed lines with [`push_line`](Self::push_line); call
/// [`finish`](Self::finish) at end of stream to flush a trailing frame
/// that was not terminated by a blank line.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    event_type: Option<String>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Consume one line of the stream. Returns a decoded message when
    /// the line completed a frame.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedFrame`] when a completed frame's
    /// data is not valid JSON.
    pub(crate) fn push_line(&mut self, line: &str) -> Result<Option<Value>> {
        // Empty line indicates end of message
        if line.is_empty() {
            return self.flush();
        }

        if let Some(event) = line.strip_prefix("event:") {
            self.event_type = Some(event.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            self.data_lines.push(data.trim().to_string());
        }
        // Comment lines (starting with `:`) and unknown fields are
        // ignored, per the SSE wire format.
        Ok(None)
    }

    /// Flush a pending frame at end of stream. The server is not
    /// required to terminate the last frame with a trailing blank line.
    pub(crate) fn finish(&mut self) -> Result<Option<Value>> {
        self.flush()
    }

    fn flush(&mut self) -> Result<Option<Value>> {
        if self.event_type.is_none() || self.data_lines.is_empty() {
            // Nothing complete is pending; drop any half-built state.
            self.event_type = None;
            self.data_lines.clear();
            return Ok(None);
        }

        let data = self.data_lines.join("\n");
        self.event_type = None;
        self.data_lines.clear();

        match serde_json::from_str(&data) {
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(ErrorKind::malformed_frame(&data)),
        }
    }
}

use std::fmt::Write;

use anyhow::Result;
use plexi_lib::Answer;

use super::Formatter;

/// Streams the answer text verbatim and appends a numbered list of
/// reference URLs.
pub(crate) struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn streaming(&self) -> bool {
        true
    }

    fn finish(&self, answer: &Answer) -> Result<Option<String>> {
        if answer.references.is_empty() {
            return Ok(None);
        }
        let mut out = String::from("References:");
        for (index, reference) in answer.references.iter().enumerate() {
            write!(out, "\n[{}] {}", index + 1, reference.url)?;
        }
        Ok(Some(out))
    }
}

use std::fmt::Write;

use anyhow::Result;
use plexi_lib::Answer;

use super::Formatter;

/// Streams the answer (which the service already produces as Markdown)
/// and appends a `## References` section with linked sources.
pub(crate) struct MarkdownFormatter;

/// Escape characters that would break out of a Markdown link.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '[' | ']' | '(' | ')' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Formatter for MarkdownFormatter {
    fn streaming(&self) -> bool {
        true
    }

    fn finish(&self, answer: &Answer) -> Result<Option<String>> {
        if answer.references.is_empty() {
            return Ok(None);
        }
        let mut out = String::from("## References");
        for (index, reference) in answer.references.iter().enumerate() {
            let name = if reference.name.is_empty() {
                &reference.url
            } else {
                &reference.name
            };
            write!(
                out,
                "\n{}. [{}]({})",
                index + 1,
                escape(name),
                reference.url
            )?;
            if !reference.snippet.is_empty() {
                write!(out, ": {}", reference.snippet)?;
            }
        }
        Ok(Some(out))
    }
}

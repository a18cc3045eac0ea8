pub(crate) mod log;

mod json;
mod markdown;
mod plain;

use anyhow::Result;
use plexi_lib::Answer;

use crate::options::OutputFormat;

/// Renders a finished answer for one output format.
pub(crate) trait Formatter {
    /// Whether the answer text is printed incrementally while it
    /// streams. When false, nothing is printed until [`finish`].
    ///
    /// [`finish`]: Formatter::finish
    fn streaming(&self) -> bool;

    /// Render the final output. For streaming formats the answer text
    /// is already on screen, so only the trailing references section is
    /// returned; `None` means there is nothing left to print.
    fn finish(&self, answer: &Answer) -> Result<Option<String>>;
}

/// Get a formatter for the given output format.
pub(crate) fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Plain => Box::new(plain::PlainFormatter),
        OutputFormat::Markdown => Box::new(markdown::MarkdownFormatter),
        OutputFormat::Json => Box::new(json::JsonFormatter),
    }
}

use anyhow::Result;
use plexi_lib::Answer;

use super::Formatter;

/// Buffers the stream and emits the complete answer as one pretty
/// printed JSON document, suitable for piping into `jq`.
pub(crate) struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn streaming(&self) -> bool {
        false
    }

    fn finish(&self, answer: &Answer) -> Result<Option<String>> {
        Ok(Some(serde_json::to_string_pretty(answer)?))
    }
}

#[cfg(test)]
mod tests {
    use plexi_lib::{Answer, WebResult};

    use super::{Formatter, JsonFormatter};

    #[test]
    fn test_emits_complete_document() {
        let answer = Answer {
            text: "the answer".to_string(),
            references: vec![WebResult {
                name: "Example".to_string(),
                url: "https://example.com".to_string(),
                snippet: String::new(),
                timestamp: None,
            }],
        };

        let output = JsonFormatter.finish(&answer).unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["text"], "the answer");
        assert_eq!(parsed["references"][0]["url"], "https://example.com");
    }
}

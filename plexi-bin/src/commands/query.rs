//! The `query` subcommand: submit a question and stream the answer.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::{StreamExt, pin_mut};
use plexi_lib::{
    Answer, ClientBuilder, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, QueryRequest, TokenStore,
};

use crate::formatters::get_formatter;
use crate::options::{Config, QueryArgs};

pub(crate) async fn query(config: &Config, args: QueryArgs) -> Result<()> {
    let store = TokenStore::new()?;
    let Some(token) = store.load()? else {
        bail!("no stored token; run `plexi auth <token>` first");
    };

    let timeout = args.timeout.or(config.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);
    let max_retries = args
        .max_retries
        .or(config.max_retries)
        .unwrap_or(DEFAULT_MAX_RETRIES);
    let client = ClientBuilder::builder()
        .token(Some(token))
        .timeout(Duration::from_secs(timeout))
        .max_retries(max_retries)
        .base_url(config.base_url.clone())
        .build()
        .client()?;

    let mut request = QueryRequest::new(&args.query);
    request.params.search_recency_filter = args.recency.clone();

    let format = args.format.or(config.format).unwrap_or_default();
    let formatter = get_formatter(format);

    let stream = client.submit_query(&request)?;
    pin_mut!(stream);

    let mut answer = Answer::default();
    let mut stdout = std::io::stdout();

    while let Some(message) = stream.next().await {
        let message = message.context("answer stream failed")?;

        if let Some(text) = message.answer_text() {
            // Messages are snapshots of the whole answer so far; print
            // only the part we have not shown yet.
            if formatter.streaming()
                && text.len() > answer.text.len()
                && text.starts_with(&answer.text)
            {
                write!(stdout, "{}", &text[answer.text.len()..])?;
                stdout.flush()?;
            }
            answer.text = text.to_string();
        }

        if message.final_sse_message {
            answer.references = message.web_results();
        }
    }

    if formatter.streaming() && !answer.text.is_empty() {
        writeln!(stdout)?;
    }

    if args.no_references {
        answer.references.clear();
    }
    if let Some(trailer) = formatter.finish(&answer)? {
        if formatter.streaming() {
            writeln!(stdout)?;
        }
        writeln!(stdout, "{trailer}")?;
    }
    Ok(())
}

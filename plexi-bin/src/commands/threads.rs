//! The `threads` subcommand: export the thread history to CSV.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use plexi_lib::{ClientBuilder, RateLimiter, ThreadScraper, TokenStore};

use crate::options::{Config, ThreadsArgs};

pub(crate) async fn threads(config: &Config, args: ThreadsArgs) -> Result<()> {
    let store = TokenStore::new()?;
    let Some(token) = store.load()? else {
        bail!("no stored token; run `plexi auth <token>` first");
    };

    let client = ClientBuilder::builder()
        .token(Some(token))
        .base_url(config.base_url.clone())
        .build()
        .client()?;

    let limiter = if config.rate_limit.enabled {
        let rate = &config.rate_limit;
        if rate.period_seconds <= 0.0 || !rate.period_seconds.is_finite() {
            bail!("rate_limit.period_seconds must be a positive number");
        }
        Some(RateLimiter::new(
            rate.requests_per_period,
            Duration::from_secs_f64(rate.period_seconds),
        )?)
    } else {
        None
    };

    let mut scraper = match limiter {
        Some(limiter) => ThreadScraper::with_rate_limiter(&client, limiter),
        None => ThreadScraper::new(&client),
    };

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message("fetching thread history");

    let records = scraper
        .scrape_all(args.from, args.to, |pages, count| {
            bar.set_message(format!("fetched {count} threads over {pages} pages"));
        })
        .await?;
    bar.finish_and_clear();

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("cannot write to `{}`", args.output.display()))?;
    for record in &records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    println!(
        "{} Exported {} threads to {}",
        style("✓").green(),
        records.len(),
        args.output.display()
    );
    Ok(())
}

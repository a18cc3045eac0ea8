//! `plexi` is an unofficial command-line client for the Perplexity.ai
//! answer engine.
//!
//! The binary is a wrapper around `plexi-lib`, which provides the
//! streaming client, rate limiter, thread scraper, and token store.
//!
//! Store a token once, then query:
//!
//! ```sh
//! plexi auth <token>
//! plexi query "How do rockets work?"
//! ```
//!
//! Export the full thread history to CSV:
//!
//! ```sh
//! plexi threads --output history.csv --from 2026-01-01
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use console::style;
use plexi_lib::ErrorKind;

mod commands;
mod formatters;
mod options;
mod verbosity;

use formatters::log::init_logging;
use options::{Command, Config, PlexiOptions};

fn main() -> ExitCode {
    let opts = PlexiOptions::parse();
    init_logging(&opts.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{} cannot start async runtime: {err}", error_prefix());
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(opts)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", error_prefix(), friendly_message(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: PlexiOptions) -> Result<()> {
    let config = Config::load(opts.config_file.as_deref())?;

    match opts.command {
        Command::Query(args) => commands::query(&config, args).await,
        Command::Auth(args) => commands::auth(&args),
        Command::Logout => commands::logout(),
        Command::Status => commands::status(),
        Command::Threads(args) => commands::threads(&config, args).await,
    }
}

fn error_prefix() -> String {
    style("Error:").red().bold().to_string()
}

/// Map the errors a user can act on to actionable messages; everything
/// else is reported as-is with its context chain.
fn friendly_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ErrorKind>() {
        Some(ErrorKind::AuthenticationFailed) => {
            "authentication failed; your token may have expired. \
             Run `plexi auth <token>` with a fresh one."
                .to_string()
        }
        Some(ErrorKind::RateLimited { attempts }) => format!(
            "the service rate limited all {attempts} attempts; wait a while before retrying"
        ),
        Some(kind) => kind.to_string(),
        None => format!("{err:#}"),
    }
}

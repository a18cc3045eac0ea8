//! Token management: `auth`, `logout`, and `status`.

use std::io::Read;

use anyhow::{Context, Result, bail};
use console::style;
use plexi_lib::TokenStore;
use secrecy::SecretString;

use crate::options::AuthArgs;

/// Encrypt and store the given token. Without an argument the token is
/// read from stdin, so it never lands in shell history.
pub(crate) fn auth(args: &AuthArgs) -> Result<()> {
    let token = match &args.token {
        Some(token) => token.trim().to_string(),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("cannot read token from stdin")?;
            buffer.trim().to_string()
        }
    };
    if token.is_empty() {
        bail!("token must not be empty");
    }

    let store = TokenStore::new()?;
    store.save(&SecretString::from(token))?;
    println!(
        "{} Token saved to {}",
        style("✓").green(),
        store.path().display()
    );
    Ok(())
}

/// Remove the stored token, if any.
pub(crate) fn logout() -> Result<()> {
    let store = TokenStore::new()?;
    if store.clear()? {
        println!(
            "{} Removed stored token at {}",
            style("✓").green(),
            store.path().display()
        );
    } else {
        println!("No token was stored.");
    }
    Ok(())
}

/// Report whether a usable token is stored. Never fails: an unreadable
/// token file is part of the status, not an error.
pub(crate) fn status() -> Result<()> {
    let store = TokenStore::new()?;
    match store.load() {
        Ok(Some(_)) => println!(
            "{} Authenticated. Token stored at {}",
            style("✓").green(),
            store.path().display()
        ),
        Ok(None) => println!("Not authenticated. Run `plexi auth <token>` to store a token."),
        Err(err) => println!(
            "{} Token file at {} is unusable: {err}",
            style("✗").red(),
            store.path().display()
        ),
    }
    Ok(())
}

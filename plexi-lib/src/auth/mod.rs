//! Persistent storage for the API token.
//!
//! The token lives in a small JSON file under the user's config
//! directory, encrypted at rest and readable only by the owner.

mod encryption;

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{ErrorKind, Result};

/// File name of the token store within the config directory.
const TOKEN_FILE: &str = "token.json";
/// Environment variable overriding the config directory, mainly for
/// tests and sandboxed installs.
const CONFIG_DIR_ENV: &str = "PLEXI_CONFIG_DIR";
/// Application directory under the platform config root.
const APP_DIR: &str = "plexi";
/// Store format version; bump on incompatible layout changes.
const STORE_VERSION: u32 = 1;

/// On-disk layout of the token file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    version: u32,
    encrypted: bool,
    token: String,
}

/// Reads and writes the token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// The store at the default location:
    /// `$PLEXI_CONFIG_DIR/token.json` when the override is set,
    /// otherwise `token.json` under the platform config directory
    /// (e.g. `~/.config/plexi/` on Linux).
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::TokenStorage`] if no config directory
    /// can be determined.
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: Self::config_dir()?.join(TOKEN_FILE),
        })
    }

    /// A store at an explicit file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| {
                ErrorKind::TokenStorage("could not determine a config directory".to_string())
            })
    }

    /// Path of the token file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a token file exists, without reading or validating it.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Encrypt and persist `token`, replacing any stored one. The file
    /// is created owner-readable only.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::TokenStorage`] on encryption failure and
    /// [`ErrorKind::IoError`] on filesystem failure.
    pub fn save(&self, token: &SecretString) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| (parent.to_path_buf(), e))?;
        }

        let stored = StoredToken {
            version: STORE_VERSION,
            encrypted: true,
            token: encryption::encrypt_token(token.expose_secret())?,
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, contents).map_err(|e| (self.path.clone(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| (self.path.clone(), e))?;
        }
        Ok(())
    }

    /// Load and decrypt the stored token. `Ok(None)` when no token has
    /// been saved yet.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::TokenStorage`] when the file exists but
    /// cannot be parsed or decrypted, and [`ErrorKind::IoError`] on
    /// filesystem failure.
    pub fn load(&self) -> Result<Option<SecretString>> {
        if !self.exists() {
            return Ok(None);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&self.path)
                .map_err(|e| (self.path.clone(), e))?
                .permissions()
                .mode();
            if mode & 0o077 != 0 {
                warn!(
                    "token file {} is readable by other users (mode {:o})",
                    self.path.display(),
                    mode & 0o777
                );
            }
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| (self.path.clone(), e))?;
        let stored: StoredToken = serde_json::from_str(&contents).map_err(|e| {
            ErrorKind::TokenStorage(format!(
                "token file {} is corrupt: {e}",
                self.path.display()
            ))
        })?;

        if stored.version != STORE_VERSION {
            return Err(ErrorKind::TokenStorage(format!(
                "token file version {} is not supported",
                stored.version
            )));
        }

        let token = if stored.encrypted {
            encryption::decrypt_token(&stored.token)?
        } else {
            stored.token
        };
        Ok(Some(SecretString::from(token)))
    }

    /// Delete the stored token. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::IoError`] on filesystem failure other
    /// than the file being absent.
    pub fn clear(&self) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| (self.path.clone(), e))?;
        Ok(true)
    }
}

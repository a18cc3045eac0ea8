//! At-rest encryption for the stored API token.
//!
//! AES-256-GCM with a key derived deterministically from stable machine
//! and user identifiers. This is obfuscation against casual file reads
//! (backups, sync folders), not protection against an attacker with
//! code execution as the same user, who could derive the same key.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::{ErrorKind, Result};

/// Domain separation salt for the key derivation.
const KEY_SALT: &[u8] = b"plexi-token-encryption";
/// AES-GCM standard nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Derive the encryption key from the username and home directory.
/// Deterministic per machine and user, so no key file needs storing.
fn derive_key() -> [u8; 32] {
    let mut hasher = Sha256::new();
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    hasher.update(user.as_bytes());
    if let Some(home) = dirs::home_dir() {
        hasher.update(home.to_string_lossy().as_bytes());
    }
    hasher.update(KEY_SALT);
    hasher.finalize().into()
}

/// Encrypt `token` for storage. Output is base64 over a random nonce
/// followed by the ciphertext.
pub(crate) fn encrypt_token(token: &str) -> Result<String> {
    let key = derive_key();
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, token.as_bytes())
        .map_err(|e| ErrorKind::TokenStorage(format!("encryption failed: {e}")))?;

    let mut payload = nonce.to_vec();
    payload.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(payload))
}

/// Decrypt a token previously produced by [`encrypt_token`].
pub(crate) fn decrypt_token(encoded: &str) -> Result<String> {
    let payload = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| ErrorKind::TokenStorage(format!("stored token is not valid base64: {e}")))?;
    if payload.len() <= NONCE_LEN {
        return Err(ErrorKind::TokenStorage(
            "stored token is truncated".to_string(),
        ));
    }

    let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
    let key = derive_key();
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            ErrorKind::TokenStorage(
                "could not decrypt stored token; it may have been written by a different user or machine"
                    .to_string(),
            )
        })?;

    String::from_utf8(plaintext)
        .map_err(|e| ErrorKind::TokenStorage(format!("decrypted token is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::{decrypt_token, encrypt_token};
    use crate::ErrorKind;

    #[test]
    fn test_round_trip() {
        let encrypted = encrypt_token("pplx-secret-token").unwrap();
        assert_ne!(encrypted, "pplx-secret-token");
        assert_eq!(decrypt_token(&encrypted).unwrap(), "pplx-secret-token");
    }

    #[test]
    fn test_nonce_makes_ciphertext_unique() {
        let a = encrypt_token("same input").unwrap();
        let b = encrypt_token("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let encrypted = encrypt_token("token").unwrap();
        let mut chars: Vec<char> = encrypted.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert!(matches!(
            decrypt_token(&tampered),
            Err(ErrorKind::TokenStorage(_))
        ));
    }

    #[test]
    fn test_garbage_input_is_rejected() {
        assert!(matches!(
            decrypt_token("not base64 !!!"),
            Err(ErrorKind::TokenStorage(_))
        ));
        assert!(matches!(
            decrypt_token("dG9vc2hvcnQ"),
            Err(ErrorKind::TokenStorage(_))
        ));
    }
}

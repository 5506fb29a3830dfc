//! Single-use bearer tokens for reference invitations.
//!
//! A token is 32 bytes from the OS RNG, encoded URL-safe base64. Only its
//! SHA-256 digest is ever persisted; lookups hash the presented token and
//! compare digests.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest, Sha256};

/// Entropy per token, in bytes (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// A freshly-minted token and its digest.
///
/// The plaintext exists only long enough to build the invite URL.
pub struct IssuedToken {
  pub plaintext: String,
  pub hash:      String,
}

impl fmt::Debug for IssuedToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("IssuedToken")
      .field("plaintext", &"<redacted>")
      .field("hash", &self.hash)
      .finish()
  }
}

/// Mint a new random token.
pub fn issue() -> IssuedToken {
  let mut bytes = [0u8; TOKEN_BYTES];
  OsRng.fill_bytes(&mut bytes);
  let plaintext = URL_SAFE_NO_PAD.encode(bytes);
  let hash = hash_token(&plaintext);
  IssuedToken { plaintext, hash }
}

/// Hex SHA-256 of a presented token.
pub fn hash_token(token: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(token.as_bytes());
  hex::encode(hasher.finalize())
}

/// Compare two digests without an early exit on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
  let (a, b) = (a.as_bytes(), b.as_bytes());
  if a.len() != b.len() {
    return false;
  }
  let mut diff: u8 = 0;
  for (x, y) in a.iter().zip(b) {
    diff |= x ^ y;
  }
  diff == 0
}

/// Short prefix of a token digest, safe to put in logs.
pub fn hash_prefix(hash: &str) -> &str { hash.get(..8).unwrap_or(hash) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn issued_tokens_are_unique_and_url_safe() {
    let a = issue();
    let b = issue();
    assert_ne!(a.plaintext, b.plaintext);
    // 32 bytes -> 43 unpadded base64 chars.
    assert_eq!(a.plaintext.len(), 43);
    assert!(
      a.plaintext
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
  }

  #[test]
  fn hash_matches_issued_digest() {
    let t = issue();
    assert_eq!(hash_token(&t.plaintext), t.hash);
    assert_eq!(t.hash.len(), 64);
  }

  #[test]
  fn constant_time_eq_behaves_like_eq() {
    assert!(constant_time_eq("abcd", "abcd"));
    assert!(!constant_time_eq("abcd", "abce"));
    assert!(!constant_time_eq("abcd", "abc"));
  }

  #[test]
  fn debug_never_prints_plaintext() {
    let t = issue();
    let dbg = format!("{t:?}");
    assert!(!dbg.contains(&t.plaintext));
  }
}

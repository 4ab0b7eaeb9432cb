//! Opaque capability tokens.
//!
//! Possession of a token is the sole authority over an offer; tokens are
//! bearer capabilities and must be unpredictable, so generation draws from
//! the operating system CSPRNG. Global uniqueness is guarded by the store's
//! UNIQUE constraint, not here — the 62^30 space makes collisions
//! astronomically unlikely, but the store retries on constraint violation.

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Fixed token length; a length mismatch is rejected before any lookup.
pub const TOKEN_LENGTH: usize = 30;

const ALPHABET: &[u8; 62] =
  b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789abcdefghijklmnopqrstuvwxyz";

/// A validated 30-character alphanumeric capability token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
  /// Draw a fresh token from the OS CSPRNG.
  pub fn generate() -> Self {
    // Rejection sampling: 248 = 62 * 4, so bytes below 248 map uniformly
    // onto the alphabet.
    const LIMIT: u8 = (ALPHABET.len() * 4) as u8;

    let mut out = String::with_capacity(TOKEN_LENGTH);
    let mut buf = [0u8; 64];
    while out.len() < TOKEN_LENGTH {
      OsRng.fill_bytes(&mut buf);
      for b in buf {
        if b < LIMIT {
          out.push(ALPHABET[b as usize % ALPHABET.len()] as char);
          if out.len() == TOKEN_LENGTH {
            break;
          }
        }
      }
    }
    Self(out)
  }

  /// Fast-path shape validation. A wrong length or a non-alphanumeric
  /// character can never resolve, so it fails as [`Error::InvalidToken`]
  /// without touching the store.
  pub fn parse(s: &str) -> Result<Self> {
    if s.len() != TOKEN_LENGTH || !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
      return Err(Error::InvalidToken);
    }
    Ok(Self(s.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Token {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<Token> for String {
  fn from(t: Token) -> Self { t.0 }
}

impl std::fmt::Display for Token {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

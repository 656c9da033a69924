//! Session token format and the cryptographic helpers behind it.
//!
//! A token is `<session id>:<secret>`, both halves lowercase hex. The id is
//! public (it is the primary key of the `sessions` row); only the SHA-256
//! digest of the secret is stored server-side.

use std::fmt;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

pub const TOKEN_SEPARATOR: char = ':';

/// Session id byte length before hex encoding (16 bytes = 32 hex chars).
pub const SESSION_ID_BYTES: usize = 16;

/// Secret byte length before hex encoding (32 bytes = 64 hex chars).
pub const SECRET_BYTES: usize = 32;

pub fn generate_session_id() -> String {
    random_hex(SESSION_ID_BYTES)
}

pub fn generate_secret() -> String {
    random_hex(SECRET_BYTES)
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of the decoded secret bytes.
pub fn hash_secret(secret: &str) -> Vec<u8> {
    let bytes = hex::decode(secret).unwrap_or_else(|_| secret.as_bytes().to_vec());
    Sha256::digest(&bytes).to_vec()
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// A token split into its two halves.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub session_id: String,
    pub secret: String,
}

impl SessionToken {
    pub fn new(session_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            secret: secret.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let mut parts = raw.split(TOKEN_SEPARATOR);

        let (Some(session_id), Some(secret), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken);
        };

        if !is_hex_of_len(session_id, SESSION_ID_BYTES) || !is_hex_of_len(secret, SECRET_BYTES) {
            return Err(AuthError::MalformedToken);
        }

        Ok(Self::new(session_id, secret))
    }

    pub fn encode(&self) -> String {
        format!("{}{}{}", self.session_id, TOKEN_SEPARATOR, self.secret)
    }
}

// Never print the secret half.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("session_id", &self.session_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn is_hex_of_len(value: &str, bytes: usize) -> bool {
    value.len() == bytes * 2
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

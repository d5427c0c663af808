use rand::RngCore;
use serde::{Deserialize, Serialize};

pub const CORRELATION_ID_LEN: usize = 30;
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of the alphabet size that fits in a byte. Bytes at or
/// above it are rejected so every symbol stays equiprobable.
const REJECTION_THRESHOLD: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Binds an upload batch to its extraction job and later poll requests.
///
/// Not a credential: it only has to be collision-free across concurrent
/// submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Draws a fresh identifier from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    pub fn generate_with<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut id = String::with_capacity(CORRELATION_ID_LEN);
        let mut buf = [0u8; CORRELATION_ID_LEN * 2];

        while id.len() < CORRELATION_ID_LEN {
            rng.fill_bytes(&mut buf);
            for byte in buf.iter().copied().filter(|b| *b < REJECTION_THRESHOLD) {
                id.push(char::from(ALPHABET[usize::from(byte) % ALPHABET.len()]));
                if id.len() == CORRELATION_ID_LEN {
                    break;
                }
            }
        }

        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid correlation id: {0:?}")]
pub struct InvalidCorrelationId(pub String);

impl std::str::FromStr for CorrelationId {
    type Err = InvalidCorrelationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == CORRELATION_ID_LEN && s.bytes().all(|b| ALPHABET.contains(&b)) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidCorrelationId(s.to_string()))
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of hex characters in a [`SessionId`].
pub const SESSION_ID_LENGTH: usize = 32;

/// Generates a random id of `bits` bits, rendered as lowercase hex.
///
/// `bits` is rounded up to whole hex characters. Every character is drawn from a uniform source,
/// there is no timestamp or counter prefix.
///
/// # Example
///
/// ```
/// let id = rum_common::generate_id(64);
/// assert_eq!(id.len(), 16);
/// assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn generate_id(bits: usize) -> String {
    let bytes: Vec<u8> = (0..bits.div_ceil(8)).map(|_| rand::random()).collect();
    let mut id = hex::encode(bytes);
    id.truncate(bits.div_ceil(4));
    id
}

/// An error returned when a session id is not 32 hex characters.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseSessionIdError {
    /// The id does not have exactly 32 characters.
    #[error("invalid session id length {0}, expected 32 hex characters")]
    InvalidLength(usize),
    /// The id contains characters outside of `[0-9a-fA-F]`.
    #[error("invalid session id, expected hex characters")]
    InvalidCharacters,
}

/// A 128-bit session identifier in its canonical form of 32 lowercase hex characters.
///
/// Construction validates the input, so holders of a `SessionId` never need to handle malformed
/// ids.
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session id from a uniform random source.
    pub fn random() -> Self {
        Self(generate_id(SESSION_ID_LENGTH * 4))
    }

    /// Parses and validates a session id.
    pub fn parse(id: &str) -> Result<Self, ParseSessionIdError> {
        if id.len() != SESSION_ID_LENGTH {
            return Err(ParseSessionIdError::InvalidLength(id.len()));
        }

        if !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseSessionIdError::InvalidCharacters);
        }

        Ok(Self(id.to_ascii_lowercase()))
    }

    /// Returns the hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interprets the leading 16 hex characters (64 bits) as a big-endian unsigned integer.
    pub fn high_bits(&self) -> u64 {
        let mut bytes = [0u8; 8];
        // The id was validated on construction.
        if hex::decode_to_slice(&self.0[..16], &mut bytes).is_err() {
            return 0;
        }
        u64::from_be_bytes(bytes)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <std::borrow::Cow<'_, str>>::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_session_id_is_valid() {
        let id = SessionId::random();
        assert_eq!(SessionId::parse(id.as_str()), Ok(id));
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(SessionId::random(), SessionId::random());
    }

    #[test]
    fn test_generate_odd_bits() {
        assert_eq!(generate_id(4).len(), 1);
        assert_eq!(generate_id(128).len(), 32);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            SessionId::parse("abc"),
            Err(ParseSessionIdError::InvalidLength(3))
        );
        assert_eq!(
            SessionId::parse(&"g".repeat(32)),
            Err(ParseSessionIdError::InvalidCharacters)
        );
        // `from_str_radix` would accept a sign, the session id must not.
        assert_eq!(
            SessionId::parse(&format!("+{}", "0".repeat(31))),
            Err(ParseSessionIdError::InvalidCharacters)
        );
    }

    #[test]
    fn test_parse_normalizes_case() {
        let id = SessionId::parse("ABCDEF0123456789ABCDEF0123456789").unwrap();
        assert_eq!(id.as_str(), "abcdef0123456789abcdef0123456789");
    }

    #[test]
    fn test_high_bits() {
        let id = SessionId::parse("1234567890abcdeffedcba0987654321").unwrap();
        assert_eq!(id.high_bits(), 0x1234_5678_90ab_cdef);

        let max = SessionId::parse(&"f".repeat(32)).unwrap();
        assert_eq!(max.high_bits(), u64::MAX);
    }

    #[test]
    fn test_deserialize_validates() {
        let id: SessionId = serde_json::from_str(&format!("\"{}\"", "0".repeat(32))).unwrap();
        assert_eq!(id.high_bits(), 0);
        assert!(serde_json::from_str::<SessionId>("\"nope\"").is_err());
    }
}

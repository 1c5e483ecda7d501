use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

/// 128-bit time-sortable identifier.
///
/// The upper 48 bits carry a millisecond timestamp, the rest is randomness.
/// On the wire it is a 16-byte big-endian buffer; in diagnostics it is the
/// 26-character Crockford base32 text form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(Ulid);

impl Id {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub const fn nil() -> Self {
        Self(Ulid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Ulid::from_bytes(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidLength(bytes.len()))?;
        Ok(Self::from_bytes(arr))
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    /// Millisecond timestamp component.
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }

    pub fn as_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from(self.0)
    }

    pub fn from_uuid(u: uuid::Uuid) -> Self {
        Self(Ulid::from(u))
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|e| IdError::InvalidText(e.to_string()))
    }
}

impl From<Ulid> for Id {
    fn from(u: Ulid) -> Self {
        Self(u)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("id must be 16 bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid id text: {0}")]
    InvalidText(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form_is_26_chars() {
        let id = Id::new();
        let s = id.to_string();
        assert_eq!(s.len(), 26);
        assert_eq!(s.parse::<Id>().unwrap(), id);
    }

    #[test]
    fn bytes_round_trip_big_endian() {
        let id = Id::new();
        let bytes = id.to_bytes();
        assert_eq!(Id::from_slice(&bytes).unwrap(), id);
        assert!(Id::from_slice(&bytes[..3]).is_err());
    }

    #[test]
    fn ordering_follows_timestamp_prefix() {
        let a = Id::from_bytes([0, 0, 0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
        let b = Id::from_bytes([0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(a < b);
        assert!(a.timestamp_ms() < b.timestamp_ms());
    }

    #[test]
    fn uuid_conversion_keeps_bytes() {
        let id = Id::new();
        assert_eq!(id.as_uuid().as_bytes(), &id.to_bytes());
        assert_eq!(Id::from_uuid(id.as_uuid()), id);
    }
}

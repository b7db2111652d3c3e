use crate::{UuidError, UuidResult};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// A generated blob name in canonical form (32 lowercase hex characters).
///
/// # Construction
/// - [`BlobName::new`] generates a fresh name.
/// - [`BlobName::parse`] validates an externally supplied name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlobName(Uuid);

/// Identifier of an in-flight chunked upload. Minted on the first chunk.
pub type UploadId = BlobName;

impl Default for BlobName {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobName {
    /// Generates a new random blob name.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a name that must already be canonical.
    ///
    /// Hyphenated or uppercase forms are not normalised.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "blob name must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid blob name '{}': {}", input, e)))
    }

    /// Returns true if `input` is in canonical form.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for BlobName {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlobName::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for BlobName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for BlobName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BlobName::parse(&s).map_err(serde::de::Error::custom)
    }
}

//! Validated text types shared across the stash crates.
//!
//! Node titles arrive from clients and end up both in the catalog and as a
//! path component on disk, so they are validated once at the boundary and
//! carried as [`NodeName`] afterwards.

/// Reasons a client supplied name is refused.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// Empty after trimming
    #[error("Name cannot be empty")]
    Empty,

    /// The name contains a path separator or a control character
    #[error("Name contains a forbidden character: {0:?}")]
    ForbiddenCharacter(char),

    /// The name is one of the reserved relative components
    #[error("Name is reserved: {0}")]
    Reserved(String),
}

/// The title of a file or folder.
///
/// A `NodeName` is a single path component: non-empty, free of `/`, `\` and
/// control characters, and never `.` or `..`. It is safe to join onto a
/// parent's relative path without further checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeName(String);

impl NodeName {
    /// Validates a client supplied title.
    ///
    /// # Arguments
    ///
    /// * `input` - Candidate title. Leading and trailing whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`TextError`] describing the first rule the title breaks.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let name = input.as_ref().trim();
        if name.is_empty() {
            return Err(TextError::Empty);
        }
        if let Some(c) = name
            .chars()
            .find(|c| matches!(c, '/' | '\\') || c.is_control())
        {
            return Err(TextError::ForbiddenCharacter(c));
        }
        if matches!(name, "." | "..") {
            return Err(TextError::Reserved(name.to_owned()));
        }
        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for NodeName {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeName::new(s)
    }
}

impl serde::Serialize for NodeName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for NodeName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NodeName::new(&s).map_err(serde::de::Error::custom)
    }
}

//! SHA-256 content hashes.

use crate::constants::COPY_BUFFER_SIZE;
use crate::FilesError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Lowercase hex SHA-256 digest of a blob's content.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn from_bytes(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parses a client supplied digest. Uppercase hex is accepted and lowered.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidHash`] unless `input` is 64 hex characters.
    pub fn parse(input: &str) -> Result<Self, FilesError> {
        let trimmed = input.trim();
        if trimmed.len() != 64 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FilesError::InvalidHash(input.to_owned()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Streams the file at `path` through SHA-256.
///
/// # Errors
///
/// Returns [`FilesError::Io`] if the file cannot be opened or read.
pub async fn sha256_file(path: &Path) -> Result<ContentHash, FilesError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let digest: [u8; 32] = hasher.finalize().into();
    Ok(ContentHash::from_bytes(&digest))
}

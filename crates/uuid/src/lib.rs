//! Opaque blob names.
//!
//! Every physical blob that is not a live file (version snapshots, trash
//! entries, upload staging, purge staging) is stored under a generated name.
//! The catalog records the name; nothing about the name carries meaning.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! This is the value produced by `Uuid::new_v4().simple().to_string()`.
//! Names received from outside the process (upload ids sent back by a client,
//! blob names read from the catalog) are validated with [`BlobName::parse`],
//! which rejects any non-canonical input. A validated name is always a single
//! safe path component.

mod blob;

pub use blob::{BlobName, UploadId, Uuid};

/// Error type for blob name operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for blob name operations.
pub type UuidResult<T> = Result<T, UuidError>;

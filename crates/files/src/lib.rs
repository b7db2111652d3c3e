//! Stash physical storage
//!
//! This crate owns everything the engine knows about bytes on disk: where each
//! user's files live, how blobs outside the live tree are named, and the thin
//! capability surface the rest of the system uses to touch the filesystem.
//!
//! ## Storage layout
//!
//! ```text
//! <data_dir>/
//! ├── <user_id>/                 # live tree, mirrors the catalog hierarchy
//! │   └── docs/report.pdf
//! └── .system/
//!     └── <user_id>/
//!         ├── trash/             # trashed blobs, opaque names
//!         ├── versions/          # historical version blobs, opaque names
//!         ├── uploads/           # chunked upload staging, <upload_id>.part
//!         └── temp/              # blobs staged for purge after commit
//! ```
//!
//! Blobs outside the live tree are addressed by [`stash_uuid::BlobName`] and
//! recorded in the catalog. A row and its blob are kept in step only by the
//! transaction coordinator in `stash-core`; nothing here knows about rows.
//!
//! ## Example Usage
//!
//! ```no_run
//! use stash_files::{FileSystem, LocalFileSystem, PathResolver};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), stash_files::FilesError> {
//! let paths = PathResolver::new("/srv/stash")?;
//! let fs = LocalFileSystem::new();
//! let source = paths.resolve_absolute(7, "docs/report.pdf")?;
//! let copy = paths.resolve_absolute(7, "archive/report.pdf")?;
//! fs.copy_file(&source, &copy, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

mod constants;
mod file_system;
mod hash;
mod mime;
mod paths;

pub use constants::{
    DEFAULT_MIME_TYPE, FOLDER_MIME_TYPE, SYSTEM_DIR_NAME, TEMP_DIR_NAME, TRASH_DIR_NAME,
    UPLOADS_DIR_NAME, UPLOAD_FILE_EXTENSION, VERSIONS_DIR_NAME,
};
pub use file_system::{FileSystem, LocalFileSystem};
pub use hash::{sha256_file, ContentHash};
pub use mime::sniff_mime;
pub use paths::PathResolver;
pub use stash_uuid::{BlobName, UploadId};

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Data directory is unusable
    #[error("Invalid data directory: {0}")]
    InvalidRootDirectory(String),

    /// Path validation failed (potential directory traversal or unsafe path)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Content hash is not 64 hex characters
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob name error from stash-uuid crate
    #[error("UUID error: {0}")]
    Uuid(#[from] stash_uuid::UuidError),
}

//! Layout and media type constants.

/// Hidden directory under the data dir holding every user's non-live areas.
pub const SYSTEM_DIR_NAME: &str = ".system";

/// Directory name for trashed blobs.
pub const TRASH_DIR_NAME: &str = "trash";

/// Directory name for historical version blobs.
pub const VERSIONS_DIR_NAME: &str = "versions";

/// Directory name for chunked upload staging.
pub const UPLOADS_DIR_NAME: &str = "uploads";

/// Directory name for blobs waiting to be purged after a commit.
pub const TEMP_DIR_NAME: &str = "temp";

/// Extension of an upload staging blob.
pub const UPLOAD_FILE_EXTENSION: &str = "part";

/// Media type recorded for folders.
pub const FOLDER_MIME_TYPE: &str = "inode/directory";

/// Fallback media type when neither the client nor sniffing can tell.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Read and write buffer for streamed copies.
pub(crate) const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Number of leading bytes inspected when sniffing a media type.
pub(crate) const SNIFF_LENGTH: usize = 8 * 1024;

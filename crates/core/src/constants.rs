//! Constants used throughout the stash core crate.

/// Default directory for stored files when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "stash_data";

/// Filename of the SQLite catalog inside the data directory's system area.
pub const CATALOG_FILE_NAME: &str = "catalog.db";

/// Number of items a bulk request runs concurrently before awaiting the batch.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Pool size. Writers still queue on SQLite's single write lock; the extra
/// connections let a batch wait there while reads proceed.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// How long a connection waits on a locked database file.
pub const DB_BUSY_TIMEOUT_SECS: u64 = 5;

/// Id of every user's root folder.
pub const ROOT_NODE_ID: i64 = 0;

/// Title of every user's root folder.
pub const ROOT_NODE_TITLE: &str = "ROOT";

//! Relational catalog of the file tree.
//!
//! The catalog is SQLite accessed through `sqlx`. Four tables mirror the
//! engine's entities (`file_nodes`, `file_versions`, `trash_box`,
//! `file_node_locks`), `favorite_nodes` marks starred nodes and
//! `node_sequences` hands out per-user node ids.
//!
//! Repository functions take a bare `&mut SqliteConnection`. Inside a
//! structural operation that connection is the coordinator's open
//! transaction; read-only queries borrow one from the pool instead.

mod favorites;
mod file_nodes;
mod listing;
mod locks;
mod models;
mod schema;
mod trash;
mod versions;

pub use favorites::FavoriteRepository;
pub use file_nodes::FileNodeRepository;
pub use listing::{ListedNode, NodeQuery, SortColumn, SortDirection, Sorting};
pub use locks::LockRepository;
pub use models::{FileNode, FileNodeLock, FileVersion, LockType, NodeType, TrashNode};
pub use trash::TrashRepository;
pub use versions::VersionRepository;

use crate::config::CoreConfig;
use crate::constants::DB_BUSY_TIMEOUT_SECS;
use crate::operations::OperationContext;
use crate::transaction::Transaction;
use crate::CoreResult;
use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use std::str::FromStr;
use std::time::Duration;

const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// Handle to the catalog database.
#[derive(Clone, Debug)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Opens (creating if missing) the catalog at `cfg.database_url()` and
    /// applies the schema.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Database`] if the URL is invalid, the file
    /// cannot be opened or a migration fails.
    pub async fn connect(cfg: &CoreConfig) -> CoreResult<Self> {
        let options = SqliteConnectOptions::from_str(cfg.database_url())?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(DB_BUSY_TIMEOUT_SECS));

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections())
            .connect_with(options)
            .await?;

        let catalog = Self { pool };
        catalog.migrate().await?;
        tracing::info!(url = cfg.database_url(), "catalog ready");
        Ok(catalog)
    }

    async fn migrate(&self) -> CoreResult<()> {
        for statement in schema::MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Starts a coordinator over a fresh database transaction.
    ///
    /// The transaction takes the write lock up front, so overlapping sagas
    /// queue on the busy timeout instead of failing to upgrade a read lock.
    pub async fn begin(&self, ctx: OperationContext) -> CoreResult<Transaction> {
        let db = self.pool.begin_with(BEGIN_WRITE).await?;
        Ok(Transaction::new(db, ctx))
    }

    /// Borrows a pooled connection for read-only queries.
    pub async fn acquire(&self) -> CoreResult<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Inserts the user's root folder if it does not exist and returns it.
    pub async fn ensure_root(&self, user_id: i64) -> CoreResult<FileNode> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;
        FileNodeRepository::ensure_root(&mut tx, &FileNode::root(user_id, Utc::now())).await?;
        let root = FileNodeRepository::get_root(&mut tx, user_id).await?;
        tx.commit().await?;
        root.ok_or_else(|| {
            crate::CoreError::InvalidInput(format!("root folder of user {} missing", user_id))
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

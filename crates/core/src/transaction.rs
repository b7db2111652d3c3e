//! Saga coordinator pairing one catalog transaction with a stack of
//! filesystem operations.
//!
//! Catalog writes are atomic through SQLite. Filesystem writes are not, so
//! every step is recorded and undone in reverse order if anything later fails.
//! The catalog is committed only after the last filesystem step succeeded;
//! blobs that must disappear for good are staged in the user's temp area and
//! purged after that commit.

use crate::catalog::LockRepository;
use crate::operations::{FileOperation, Location, OperationContext};
use crate::{CoreError, CoreResult};
use sqlx::{Sqlite, SqliteConnection};
use tokio_util::sync::CancellationToken;

pub struct Transaction {
    db: Option<sqlx::Transaction<'static, Sqlite>>,
    ctx: OperationContext,
    executed: Vec<FileOperation>,
    locks: Vec<i64>,
    purge: Vec<Location>,
}

impl Transaction {
    pub(crate) fn new(db: sqlx::Transaction<'static, Sqlite>, ctx: OperationContext) -> Self {
        Self {
            db: Some(db),
            ctx,
            executed: Vec::new(),
            locks: Vec::new(),
            purge: Vec::new(),
        }
    }

    pub fn user_id(&self) -> i64 {
        self.ctx.user_id
    }

    pub fn context(&self) -> &OperationContext {
        &self.ctx
    }

    /// The open catalog connection. Every query of the saga must go through it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TransactionClosed`] once the saga has been unwound.
    pub fn conn(&mut self) -> CoreResult<&mut SqliteConnection> {
        self.db.as_deref_mut().ok_or(CoreError::TransactionClosed)
    }

    /// Number of filesystem steps that would be compensated on rollback.
    pub fn pending(&self) -> usize {
        self.executed.len()
    }

    /// Runs `op` and records it for compensation.
    ///
    /// On failure the step's own partial effects are cleaned up, every earlier
    /// step is compensated and the catalog transaction is rolled back. The
    /// coordinator is closed afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Cancelled`] if `cancel` fired, otherwise
    /// [`CoreError::OperationFailed`] naming the step.
    pub async fn execute(
        &mut self,
        mut op: FileOperation,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        if self.db.is_none() {
            return Err(CoreError::TransactionClosed);
        }

        let started = !cancel.is_cancelled();
        if op.execute(&self.ctx, cancel).await {
            self.executed.push(op);
            return Ok(());
        }

        if started {
            if let Some(cleanup) = op.partial_cleanup() {
                if !cleanup.execute(&self.ctx).await {
                    tracing::error!(
                        "partial effects of {} for user {} could not be cleaned up",
                        op.name(),
                        self.ctx.user_id
                    );
                }
            }
        }

        if let Err(e) = self.unwind().await {
            tracing::error!("catalog rollback after failed {} failed: {}", op.name(), e);
        }

        if cancel.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Err(CoreError::OperationFailed(op.name()))
        }
    }

    /// Records a lock row inserted in this transaction so commit removes it.
    pub fn register_lock(&mut self, node_id: i64) {
        self.locks.push(node_id);
    }

    /// Deletes `location` from disk once the catalog commit has succeeded.
    pub fn purge_after_commit(&mut self, location: Location) {
        self.purge.push(location);
    }

    /// Releases locks, commits the catalog, then purges staged blobs.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Cancelled`] (after rolling back) if `cancel` fired,
    /// or the database error if releasing locks or committing failed. In both
    /// cases the filesystem steps have been compensated.
    pub async fn commit(mut self, cancel: &CancellationToken) -> CoreResult<()> {
        if cancel.is_cancelled() {
            tracing::info!(
                "commit for user {} cancelled, rolling back {} operation(s)",
                self.ctx.user_id,
                self.executed.len()
            );
            self.unwind().await?;
            return Err(CoreError::Cancelled);
        }

        let user_id = self.ctx.user_id;
        let mut db = self.db.take().ok_or(CoreError::TransactionClosed)?;

        for node_id in std::mem::take(&mut self.locks) {
            if let Err(e) = LockRepository::delete(&mut db, user_id, node_id).await {
                self.db = Some(db);
                self.unwind().await?;
                return Err(e);
            }
        }

        if let Err(e) = db.commit().await {
            tracing::error!("catalog commit for user {} failed: {}", user_id, e);
            self.revert_executed().await;
            return Err(e.into());
        }

        self.executed.clear();
        self.purge_staged().await;
        Ok(())
    }

    /// Compensates every executed step in reverse order, then rolls back the
    /// catalog.
    pub async fn rollback(mut self) -> CoreResult<()> {
        self.unwind().await
    }

    async fn unwind(&mut self) -> CoreResult<()> {
        self.locks.clear();
        self.purge.clear();
        self.revert_executed().await;
        if let Some(db) = self.db.take() {
            db.rollback().await?;
        }
        Ok(())
    }

    async fn revert_executed(&mut self) {
        while let Some(op) = self.executed.pop() {
            match op.revert() {
                Ok(revert) => {
                    let name = revert.name();
                    if !revert.execute(&self.ctx).await {
                        tracing::error!(
                            "compensation {} of {} failed, continuing unwind",
                            name,
                            op.name()
                        );
                    }
                }
                Err(e) => tracing::error!("{}", e),
            }
        }
    }

    async fn purge_staged(&mut self) {
        for location in std::mem::take(&mut self.purge) {
            let path = match location.resolve(&self.ctx) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("cannot resolve {} for purge: {}", location, e);
                    continue;
                }
            };
            if self.ctx.fs.delete_file(&path).await.is_ok() {
                continue;
            }
            if let Err(e) = self.ctx.fs.delete_dir_all(&path).await {
                tracing::warn!("purge of {} left on disk: {}", location, e);
            }
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.db.is_some() && !self.executed.is_empty() {
            tracing::warn!(
                "transaction for user {} dropped unfinished, {} filesystem operation(s) not compensated",
                self.ctx.user_id,
                self.executed.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FileNodeRepository, LockType, NodeType};
    use crate::locks::{LockManager, LockOutcome};
    use crate::test_support::{self, FailingFileSystem};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_failure_unwinds_earlier_operations() {
        let temp = TempDir::new().unwrap();
        let fs = Arc::new(FailingFileSystem::new());
        let service = test_support::service_with(&temp, fs.clone()).await;
        // mkdir a, mkdir b, then the copy fails.
        fs.arm(3);
        let ctx = service.context(1);
        let cancel = CancellationToken::new();

        let mut tx = service.catalog().begin(ctx.clone()).await.unwrap();
        tx.execute(FileOperation::create_folder(Location::Live("a".into())), &cancel)
            .await
            .unwrap();
        tx.execute(FileOperation::create_folder(Location::Live("b".into())), &cancel)
            .await
            .unwrap();
        let err = tx
            .execute(
                FileOperation::copy_file(Location::Live("a/x".into()), Location::Live("b/x".into())),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::OperationFailed("copy_file")));
        assert!(matches!(tx.conn(), Err(CoreError::TransactionClosed)));
        assert_eq!(tx.pending(), 0);
        let root = ctx.paths.user_root(1);
        assert!(!root.join("a").exists());
        assert!(!root.join("b").exists());
    }

    #[tokio::test]
    async fn test_rollback_discards_catalog_writes() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let cancel = CancellationToken::new();

        let mut tx = service.catalog().begin(service.context(1)).await.unwrap();
        tx.execute(FileOperation::create_folder(Location::Live("docs".into())), &cancel)
            .await
            .unwrap();
        let id = FileNodeRepository::next_id(tx.conn().unwrap(), 1).await.unwrap();
        tx.rollback().await.unwrap();

        let mut conn = service.catalog().acquire().await.unwrap();
        assert!(FileNodeRepository::get(&mut conn, 1, id).await.unwrap().is_none());
        assert!(!service.context(1).paths.user_root(1).join("docs").exists());
    }

    #[tokio::test]
    async fn test_cancel_before_commit_rolls_back() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let cancel = CancellationToken::new();

        let mut tx = service.catalog().begin(service.context(1)).await.unwrap();
        tx.execute(FileOperation::create_folder(Location::Live("docs".into())), &cancel)
            .await
            .unwrap();
        cancel.cancel();

        assert!(matches!(tx.commit(&cancel).await, Err(CoreError::Cancelled)));
        assert!(!service.context(1).paths.user_root(1).join("docs").exists());
    }

    #[tokio::test]
    async fn test_commit_releases_locks_and_purges_temp() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let ctx = service.context(1);
        let cancel = CancellationToken::new();
        std::fs::write(ctx.paths.user_root(1).join("old.txt"), b"old").unwrap();
        let staged = Location::Temp(ctx.paths.new_blob_name());

        let mut tx = service.catalog().begin(ctx.clone()).await.unwrap();
        let outcome = LockManager::acquire(&mut tx, 0, LockType::Delete).await.unwrap();
        assert_eq!(outcome, LockOutcome::Acquired);
        tx.execute(
            FileOperation::rename_entry(Location::Live("old.txt".into()), staged.clone()),
            &cancel,
        )
        .await
        .unwrap();
        tx.purge_after_commit(staged.clone());
        tx.commit(&cancel).await.unwrap();

        assert!(!staged.resolve(&ctx).unwrap().exists());
        let mut conn = service.catalog().acquire().await.unwrap();
        let locks = LockRepository::locks_in_closure(&mut conn, 1, 0).await.unwrap();
        assert!(locks.is_empty());
        let root = FileNodeRepository::get_root(&mut conn, 1).await.unwrap().unwrap();
        assert_eq!(root.node_type, NodeType::Folder);
    }

    #[tokio::test]
    async fn test_unsupported_revert_does_not_stop_unwind() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let ctx = service.context(1);
        let cancel = CancellationToken::new();
        let version = ctx.paths.new_blob_name();
        std::fs::write(ctx.paths.version_file(1, &version), b"v1").unwrap();

        let mut tx = service.catalog().begin(ctx.clone()).await.unwrap();
        tx.execute(FileOperation::create_folder(Location::Live("docs".into())), &cancel)
            .await
            .unwrap();
        tx.execute(
            FileOperation::restore_version(
                Location::Version(version),
                Location::Live("docs/a.txt".into()),
            ),
            &cancel,
        )
        .await
        .unwrap();
        std::fs::remove_file(ctx.paths.user_root(1).join("docs/a.txt")).unwrap();
        tx.rollback().await.unwrap();

        assert!(!ctx.paths.user_root(1).join("docs").exists());
    }
}

//! Advisory subtree locks: a lock row conflicts with any lock on the node's
//! ancestors or descendants, and is written and released inside the saga's
//! own database transaction.

use crate::catalog::{FileNodeLock, LockRepository, LockType};
use crate::transaction::Transaction;
use crate::CoreResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// Existing locks in the node's ancestor-or-descendant closure.
    Held(Vec<FileNodeLock>),
}

pub struct LockManager;

impl LockManager {
    /// Takes a write lock on `node_id` unless its closure is already locked.
    pub async fn acquire(
        tx: &mut Transaction,
        node_id: i64,
        lock_type: LockType,
    ) -> CoreResult<LockOutcome> {
        let user_id = tx.user_id();
        let held = LockRepository::locks_in_closure(tx.conn()?, user_id, node_id).await?;
        if !held.is_empty() {
            tracing::info!(
                "node {} of user {} is locked ({} lock(s) in its closure)",
                node_id,
                user_id,
                held.len()
            );
            return Ok(LockOutcome::Held(held));
        }

        let lock = FileNodeLock {
            user_id,
            id: node_id,
            write_lock: true,
            lock_type,
        };
        LockRepository::insert(tx.conn()?, &lock).await?;
        tx.register_lock(node_id);
        Ok(LockOutcome::Acquired)
    }
}

use super::{RenameNodeResult, TreeService};
use crate::catalog::{FileNode, FileNodeRepository, LockType};
use crate::locks::{LockManager, LockOutcome};
use crate::operations::{FileOperation, Location};
use crate::transaction::Transaction;
use crate::CoreResult;
use stash_files::PathResolver;
use stash_types::NodeName;
use tokio_util::sync::CancellationToken;

impl TreeService {
    /// Renames a file or folder in place. Folder descendants follow.
    pub async fn rename_node(
        &self,
        user_id: i64,
        node_id: i64,
        new_name: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<RenameNodeResult> {
        let name = NodeName::new(new_name)?;
        let mut tx = self.begin(user_id).await?;
        let result = self.rename_in(&mut tx, node_id, &name, cancel).await;
        self.finish(tx, result, cancel).await
    }

    async fn rename_in(
        &self,
        tx: &mut Transaction,
        node_id: i64,
        name: &NodeName,
        cancel: &CancellationToken,
    ) -> CoreResult<RenameNodeResult> {
        let user_id = tx.user_id();
        let node = match FileNodeRepository::get(tx.conn()?, user_id, node_id).await? {
            Some(node) if !node.is_root() => node,
            _ => return Ok(RenameNodeResult::NodeNotFound),
        };
        if node.title == name.as_str() {
            return Ok(RenameNodeResult::Success(node));
        }
        let Some(parent_id) = node.parent_id else {
            return Ok(RenameNodeResult::NodeNotFound);
        };
        if FileNodeRepository::get_child_by_title(tx.conn()?, user_id, parent_id, name.as_str())
            .await?
            .is_some()
        {
            return Ok(RenameNodeResult::NodeWithSameNameExist);
        }
        if let LockOutcome::Held(_) = LockManager::acquire(tx, node_id, LockType::Move).await? {
            return Ok(RenameNodeResult::Locked);
        }

        let new_path =
            PathResolver::child_path(PathResolver::parent_path(&node.filesystem_path), name);
        tx.execute(
            FileOperation::rename_entry(
                Location::Live(node.filesystem_path.clone()),
                Location::Live(new_path.clone()),
            ),
            cancel,
        )
        .await?;
        FileNodeRepository::rename(
            tx.conn()?,
            user_id,
            node_id,
            name.as_str(),
            &node.filesystem_path,
            &new_path,
        )
        .await?;

        tracing::info!(
            "renamed {} to {} for user {}",
            node.filesystem_path,
            new_path,
            user_id
        );
        Ok(RenameNodeResult::Success(FileNode {
            title: name.to_string(),
            filesystem_path: new_path,
            ..node
        }))
    }
}

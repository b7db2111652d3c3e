//! Delete-to-trash and restore-from-trash.
//!
//! Trashing a file moves its whole history into `trash_box`: every stored
//! version first, then the live content. Rows for the same logical path never
//! collide because each deletion is shifted past the highest version already
//! in the trash for that path. With a trash holding versions 1..3 of
//! `docs/a.txt`, deleting a new `docs/a.txt` at version 1 stores it as 4.

use super::{DeleteNodeResult, RestoreTrashResult, TreeService};
use crate::catalog::{
    FileNode, FileNodeRepository, LockType, NodeType, TrashNode, TrashRepository,
    VersionRepository,
};
use crate::locks::{LockManager, LockOutcome};
use crate::operations::{FileOperation, Location};
use crate::transaction::Transaction;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use stash_files::{sha256_file, PathResolver};
use stash_types::NodeName;
use tokio_util::sync::CancellationToken;

impl TreeService {
    /// Moves a file or folder, with its history, to the trash.
    pub async fn delete_node(
        &self,
        user_id: i64,
        node_id: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<DeleteNodeResult> {
        let mut tx = self.begin(user_id).await?;
        let result = self.delete_in(&mut tx, node_id, cancel).await;
        self.finish(tx, result, cancel).await
    }

    async fn delete_in(
        &self,
        tx: &mut Transaction,
        node_id: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<DeleteNodeResult> {
        let user_id = tx.user_id();
        let node = match FileNodeRepository::get(tx.conn()?, user_id, node_id).await? {
            Some(node) if !node.is_root() => node,
            _ => return Ok(DeleteNodeResult::NodeNotFound),
        };
        if let LockOutcome::Held(_) = LockManager::acquire(tx, node_id, LockType::Delete).await? {
            return Ok(DeleteNodeResult::Locked);
        }

        self.trash_node(tx, &node, Utc::now(), cancel).await?;
        tracing::info!("trashed {} for user {}", node.filesystem_path, user_id);
        Ok(DeleteNodeResult::Success)
    }

    /// Trashes `node`; folders are emptied child by child before the folder
    /// itself is removed.
    fn trash_node<'a>(
        &'a self,
        tx: &'a mut Transaction,
        node: &'a FileNode,
        deleted_at: DateTime<Utc>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(async move {
            if node.is_file() {
                return self.trash_file(tx, node, deleted_at, cancel).await;
            }

            let user_id = tx.user_id();
            for child in FileNodeRepository::children(tx.conn()?, user_id, node.id).await? {
                self.trash_node(tx, &child, deleted_at, cancel).await?;
            }

            let offset = TrashRepository::max_version(tx.conn()?, user_id, &node.filesystem_path)
                .await?
                .unwrap_or(0);
            tx.execute(
                FileOperation::delete_folder(Location::Live(node.filesystem_path.clone())),
                cancel,
            )
            .await?;
            let entry = TrashNode::from_live(node, offset, None, deleted_at);
            TrashRepository::insert(tx.conn()?, &entry).await?;
            FileNodeRepository::delete(tx.conn()?, user_id, node.id).await?;
            Ok(())
        })
    }

    async fn trash_file(
        &self,
        tx: &mut Transaction,
        node: &FileNode,
        deleted_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        let user_id = tx.user_id();
        let offset = TrashRepository::max_version(tx.conn()?, user_id, &node.filesystem_path)
            .await?
            .unwrap_or(0);

        for version in VersionRepository::list(tx.conn()?, user_id, node.id).await? {
            let blob = self.paths.new_blob_name();
            tx.execute(
                FileOperation::move_to_trash(
                    Location::Version(version.blob()?),
                    Location::Trash(blob),
                ),
                cancel,
            )
            .await?;
            let entry = TrashNode::from_version(node, &version, offset, &blob, deleted_at);
            TrashRepository::insert(tx.conn()?, &entry).await?;
            VersionRepository::delete(tx.conn()?, user_id, node.id, version.version).await?;
        }

        let blob = self.paths.new_blob_name();
        tx.execute(
            FileOperation::move_to_trash(
                Location::Live(node.filesystem_path.clone()),
                Location::Trash(blob),
            ),
            cancel,
        )
        .await?;
        let entry = TrashNode::from_live(node, offset, Some(&blob), deleted_at);
        TrashRepository::insert(tx.conn()?, &entry).await?;
        FileNodeRepository::delete(tx.conn()?, user_id, node.id).await?;
        Ok(())
    }

    /// Brings one trash entry back into its original folder as a new node.
    ///
    /// A restored file starts a fresh history at version 1. A restored folder
    /// comes back empty; its former children are separate trash entries.
    pub async fn restore_from_trash(
        &self,
        user_id: i64,
        trash_id: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<RestoreTrashResult> {
        let mut tx = self.begin(user_id).await?;
        let result = self.restore_from_trash_in(&mut tx, trash_id, cancel).await;
        self.finish(tx, result, cancel).await
    }

    async fn restore_from_trash_in(
        &self,
        tx: &mut Transaction,
        trash_id: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<RestoreTrashResult> {
        let user_id = tx.user_id();
        let Some(entry) = TrashRepository::get(tx.conn()?, user_id, trash_id).await? else {
            return Ok(RestoreTrashResult::EntryNotFound);
        };
        let parent = match entry.parent_id {
            Some(parent_id) => FileNodeRepository::get(tx.conn()?, user_id, parent_id).await?,
            None => None,
        };
        let Some(parent) = parent.filter(FileNode::is_folder) else {
            return Ok(RestoreTrashResult::ParentNotFound);
        };
        let name = NodeName::new(&entry.title)?;
        if FileNodeRepository::get_child_by_title(tx.conn()?, user_id, parent.id, name.as_str())
            .await?
            .is_some()
        {
            return Ok(RestoreTrashResult::NodeWithSameNameExist);
        }

        let node = match entry.node_type {
            NodeType::Folder => self.create_folder_node(tx, &parent, &name, cancel).await?,
            NodeType::File => self.restore_file(tx, &entry, &parent, &name, cancel).await?,
        };
        TrashRepository::delete(tx.conn()?, user_id, trash_id).await?;
        tracing::info!(
            "restored trash entry {} to {} for user {}",
            trash_id,
            node.filesystem_path,
            user_id
        );
        Ok(RestoreTrashResult::Success(node))
    }

    async fn restore_file(
        &self,
        tx: &mut Transaction,
        entry: &TrashNode,
        parent: &FileNode,
        name: &NodeName,
        cancel: &CancellationToken,
    ) -> CoreResult<FileNode> {
        let blob = entry.blob()?.ok_or_else(|| {
            CoreError::InvalidInput(format!("trash entry {} has no blob", entry.trash_id))
        })?;
        let path = PathResolver::child_path(&parent.filesystem_path, name);
        let live = Location::Live(path.clone());
        tx.execute(
            FileOperation::restore_from_trash(Location::Trash(blob), live.clone()),
            cancel,
        )
        .await?;

        let hash_sum = sha256_file(&live.resolve(tx.context())?)
            .await
            .ok()
            .map(|hash| hash.to_string());
        let user_id = tx.user_id();
        let node = FileNode {
            id: FileNodeRepository::next_id(tx.conn()?, user_id).await?,
            user_id,
            title: name.to_string(),
            parent_id: Some(parent.id),
            node_type: NodeType::File,
            filesystem_path: path,
            mime_type: entry.mime_type.clone(),
            modified_at: Utc::now(),
            size: entry.size,
            version: 1,
            hash_sum,
        };
        FileNodeRepository::insert(tx.conn()?, &node).await?;
        Ok(node)
    }
}

use super::{CreateFolderResult, TreeService};
use crate::catalog::{FileNode, FileNodeRepository, NodeType};
use crate::operations::{FileOperation, Location};
use crate::transaction::Transaction;
use crate::CoreResult;
use chrono::Utc;
use stash_files::{PathResolver, FOLDER_MIME_TYPE};
use stash_types::NodeName;
use tokio_util::sync::CancellationToken;

impl TreeService {
    /// Creates a folder named `name` inside `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidName`] if `name` is not a valid node
    /// name, before anything is touched.
    pub async fn create_folder(
        &self,
        user_id: i64,
        parent_id: i64,
        name: &str,
        cancel: &CancellationToken,
    ) -> CoreResult<CreateFolderResult> {
        let name = NodeName::new(name)?;
        let mut tx = self.begin(user_id).await?;
        let result = self.create_folder_in(&mut tx, parent_id, &name, cancel).await;
        self.finish(tx, result, cancel).await
    }

    async fn create_folder_in(
        &self,
        tx: &mut Transaction,
        parent_id: i64,
        name: &NodeName,
        cancel: &CancellationToken,
    ) -> CoreResult<CreateFolderResult> {
        let user_id = tx.user_id();
        let Some(parent) = FileNodeRepository::get(tx.conn()?, user_id, parent_id).await? else {
            return Ok(CreateFolderResult::ParentNotFound);
        };
        if !parent.is_folder() {
            return Ok(CreateFolderResult::ParentNotFound);
        }

        match FileNodeRepository::get_child_by_title(tx.conn()?, user_id, parent.id, name.as_str())
            .await?
        {
            Some(existing) if existing.is_folder() => {
                return Ok(CreateFolderResult::FolderWithSameNameExist)
            }
            Some(_) => return Ok(CreateFolderResult::FileWithSameNameExist),
            None => {}
        }

        let node = self.create_folder_node(tx, &parent, name, cancel).await?;
        tracing::info!("created folder {} for user {}", node.filesystem_path, user_id);
        Ok(CreateFolderResult::Success(node))
    }

    /// Makes the directory, then inserts its row. The caller has already
    /// checked that the name is free.
    pub(super) async fn create_folder_node(
        &self,
        tx: &mut Transaction,
        parent: &FileNode,
        name: &NodeName,
        cancel: &CancellationToken,
    ) -> CoreResult<FileNode> {
        let path = PathResolver::child_path(&parent.filesystem_path, name);
        tx.execute(FileOperation::create_folder(Location::Live(path.clone())), cancel)
            .await?;

        let user_id = tx.user_id();
        let node = FileNode {
            id: FileNodeRepository::next_id(tx.conn()?, user_id).await?,
            user_id,
            title: name.to_string(),
            parent_id: Some(parent.id),
            node_type: NodeType::Folder,
            filesystem_path: path,
            mime_type: FOLDER_MIME_TYPE.to_owned(),
            modified_at: Utc::now(),
            size: 0,
            version: 1,
            hash_sum: None,
        };
        FileNodeRepository::insert(tx.conn()?, &node).await?;
        Ok(node)
    }
}

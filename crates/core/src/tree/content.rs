//! File content changes: new files, overwrites and version history.
//!
//! Live content is always the node's current version. Overwriting first
//! snapshots the live bytes into a version blob recorded at the node's old
//! version number, then replaces the live file and bumps the version, so
//! `file_versions` only ever holds numbers below the node's own.

use super::{RestoreVersionResult, TreeService};
use crate::catalog::{
    FileNode, FileNodeRepository, FileVersion, LockType, NodeType, VersionRepository,
};
use crate::locks::{LockManager, LockOutcome};
use crate::operations::{FileOperation, Location};
use crate::transaction::Transaction;
use crate::CoreResult;
use chrono::Utc;
use stash_files::{sha256_file, PathResolver};
use stash_types::NodeName;
use tokio_util::sync::CancellationToken;

/// Where new live content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Leave the source in place, for copies.
    CopyFrom(Location),
    /// Consume the source, for uploads.
    MoveFrom(Location),
}

impl Content {
    fn into_operation(self, destination: Location) -> FileOperation {
        match self {
            Content::CopyFrom(source) => FileOperation::copy_file(source, destination),
            Content::MoveFrom(source) => FileOperation::move_file(source, destination),
        }
    }
}

/// Content plus the metadata the catalog stores alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContent {
    pub content: Content,
    pub size: i64,
    pub mime_type: String,
    pub hash_sum: Option<String>,
}

impl TreeService {
    /// Replaces the content of `node`, keeping the old bytes as a version.
    pub(super) async fn overwrite(
        &self,
        tx: &mut Transaction,
        node: &FileNode,
        new: NewContent,
        cancel: &CancellationToken,
    ) -> CoreResult<FileNode> {
        self.snapshot_version(tx, node, cancel).await?;
        tx.execute(
            new.content
                .into_operation(Location::Live(node.filesystem_path.clone())),
            cancel,
        )
        .await?;

        let updated = FileNode {
            version: node.version + 1,
            size: new.size,
            mime_type: new.mime_type,
            modified_at: Utc::now(),
            hash_sum: new.hash_sum,
            ..node.clone()
        };
        FileNodeRepository::update_content(tx.conn()?, &updated).await?;
        tracing::debug!(
            "{} of user {} is now version {}",
            updated.filesystem_path,
            updated.user_id,
            updated.version
        );
        Ok(updated)
    }

    /// Writes a new file under `parent` and inserts its row at `version`.
    pub(super) async fn create_file_node(
        &self,
        tx: &mut Transaction,
        parent: &FileNode,
        name: &NodeName,
        new: NewContent,
        version: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<FileNode> {
        let path = PathResolver::child_path(&parent.filesystem_path, name);
        tx.execute(new.content.into_operation(Location::Live(path.clone())), cancel)
            .await?;

        let user_id = tx.user_id();
        let node = FileNode {
            id: FileNodeRepository::next_id(tx.conn()?, user_id).await?,
            user_id,
            title: name.to_string(),
            parent_id: Some(parent.id),
            node_type: NodeType::File,
            filesystem_path: path,
            mime_type: new.mime_type,
            modified_at: Utc::now(),
            size: new.size,
            version,
            hash_sum: new.hash_sum,
        };
        FileNodeRepository::insert(tx.conn()?, &node).await?;
        Ok(node)
    }

    /// Copies the live bytes of `node` to a fresh version blob and records it
    /// at the node's current version.
    pub(super) async fn snapshot_version(
        &self,
        tx: &mut Transaction,
        node: &FileNode,
        cancel: &CancellationToken,
    ) -> CoreResult<FileVersion> {
        let blob = self.paths.new_blob_name();
        tx.execute(
            FileOperation::create_version(
                Location::Live(node.filesystem_path.clone()),
                Location::Version(blob),
            ),
            cancel,
        )
        .await?;

        let version = FileVersion {
            id: node.id,
            user_id: node.user_id,
            version: node.version,
            created_at: node.modified_at,
            size: node.size,
            file_name: blob.to_string(),
        };
        VersionRepository::insert(tx.conn()?, &version).await?;
        Ok(version)
    }

    /// Makes a stored version the live content again, as a new version.
    ///
    /// The current content is snapshotted first, so nothing is lost and the
    /// restored bytes get the next version number.
    pub async fn restore_version(
        &self,
        user_id: i64,
        node_id: i64,
        version: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<RestoreVersionResult> {
        let mut tx = self.begin(user_id).await?;
        let result = self.restore_version_in(&mut tx, node_id, version, cancel).await;
        self.finish(tx, result, cancel).await
    }

    async fn restore_version_in(
        &self,
        tx: &mut Transaction,
        node_id: i64,
        version: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<RestoreVersionResult> {
        let user_id = tx.user_id();
        let node = match FileNodeRepository::get(tx.conn()?, user_id, node_id).await? {
            Some(node) if !node.is_root() => node,
            _ => return Ok(RestoreVersionResult::NodeNotFound),
        };
        if !node.is_file() {
            return Ok(RestoreVersionResult::NotAFile);
        }
        let Some(stored) = VersionRepository::get(tx.conn()?, user_id, node_id, version).await?
        else {
            return Ok(RestoreVersionResult::VersionNotFound);
        };
        if let LockOutcome::Held(_) = LockManager::acquire(tx, node_id, LockType::Copy).await? {
            return Ok(RestoreVersionResult::Locked);
        }

        self.snapshot_version(tx, &node, cancel).await?;
        // Not reversible on its own; on unwind the snapshot's compensation
        // puts the previous live bytes back.
        let live = Location::Live(node.filesystem_path.clone());
        tx.execute(
            FileOperation::restore_version(Location::Version(stored.blob()?), live.clone()),
            cancel,
        )
        .await?;

        let hash_sum = sha256_file(&live.resolve(tx.context())?)
            .await
            .ok()
            .map(|hash| hash.to_string());
        let updated = FileNode {
            version: node.version + 1,
            size: stored.size,
            modified_at: Utc::now(),
            hash_sum,
            ..node
        };
        FileNodeRepository::update_content(tx.conn()?, &updated).await?;
        tracing::info!(
            "restored version {} of {} for user {} as version {}",
            version,
            updated.filesystem_path,
            user_id,
            updated.version
        );
        Ok(RestoreVersionResult::Success(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, FailingFileSystem};
    use crate::tree::UploadFileResult;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_overwrite_keeps_versions_below_live() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        test_support::upload(&service, 0, "a.txt", b"one").await;
        test_support::upload(&service, 0, "a.txt", b"two").await;
        let node = test_support::upload(&service, 0, "a.txt", b"three").await;

        assert_eq!(node.version, 3);
        let versions = service.versions(1, node.id).await.unwrap();
        let numbers: Vec<_> = versions.iter().map(|v| v.version).collect();
        assert_eq!(numbers, [1, 2]);
        assert_eq!(versions[0].size, 3);

        let blob = service.paths().version_file(1, &versions[1].blob().unwrap());
        assert_eq!(std::fs::read(blob).unwrap(), b"two");
        assert_eq!(
            std::fs::read(service.paths().user_root(1).join("a.txt")).unwrap(),
            b"three"
        );
    }

    #[tokio::test]
    async fn test_restore_version_round_trip() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let cancel = CancellationToken::new();
        test_support::upload(&service, 0, "a.txt", b"first").await;
        let node = test_support::upload(&service, 0, "a.txt", b"second").await;

        let restored = match service.restore_version(1, node.id, 1, &cancel).await.unwrap() {
            RestoreVersionResult::Success(node) => node,
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(restored.version, 3);
        assert_eq!(restored.size, 5);
        assert_eq!(
            std::fs::read(service.paths().user_root(1).join("a.txt")).unwrap(),
            b"first"
        );
        let numbers: Vec<_> = service
            .versions(1, node.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(numbers, [1, 2]);
    }

    #[tokio::test]
    async fn test_restoring_consecutive_versions_replays_history() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let cancel = CancellationToken::new();
        let live = service.paths().user_root(1).join("a.txt");
        test_support::upload(&service, 0, "a.txt", b"one").await;
        test_support::upload(&service, 0, "a.txt", b"two").await;
        let node = test_support::upload(&service, 0, "a.txt", b"three").await;

        for (version, expected) in [(1, &b"one"[..]), (2, &b"two"[..])] {
            match service.restore_version(1, node.id, version, &cancel).await.unwrap() {
                RestoreVersionResult::Success(restored) => {
                    assert_eq!(restored.size, expected.len() as i64)
                }
                other => panic!("unexpected {:?}", other),
            }
            assert_eq!(std::fs::read(&live).unwrap(), expected);
        }

        let current = service.get_node(1, node.id).await.unwrap().unwrap();
        assert_eq!(current.version, 5);
        let numbers: Vec<_> = service
            .versions(1, node.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(numbers, [1, 2, 3, 4]);
        let snapshot = &service.versions(1, node.id).await.unwrap()[3];
        let blob = service.paths().version_file(1, &snapshot.blob().unwrap());
        assert_eq!(std::fs::read(blob).unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_restore_version_rejections() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let cancel = CancellationToken::new();
        let folder = test_support::folder(&service, 0, "docs").await;
        let file = test_support::upload(&service, 0, "a.txt", b"x").await;

        assert_eq!(
            service.restore_version(1, 99, 1, &cancel).await.unwrap(),
            RestoreVersionResult::NodeNotFound
        );
        assert_eq!(
            service.restore_version(1, folder.id, 1, &cancel).await.unwrap(),
            RestoreVersionResult::NotAFile
        );
        assert_eq!(
            service.restore_version(1, file.id, 1, &cancel).await.unwrap(),
            RestoreVersionResult::VersionNotFound
        );
    }

    #[tokio::test]
    async fn test_failed_overwrite_restores_live_bytes() {
        let temp = TempDir::new().unwrap();
        let fs = Arc::new(FailingFileSystem::new());
        let service = test_support::service_with(&temp, fs.clone()).await;
        let node = test_support::upload(&service, 0, "a.txt", b"one").await;
        // Stage the chunk, snapshot the live file, then fail moving the upload in.
        fs.arm(3);

        let result = test_support::try_upload(&service, 0, "a.txt", b"two").await;
        assert_eq!(result, UploadFileResult::UploadError);

        let current = service.get_node(1, node.id).await.unwrap().unwrap();
        assert_eq!(current.version, 1);
        assert!(service.versions(1, node.id).await.unwrap().is_empty());
        assert_eq!(
            std::fs::read(service.paths().user_root(1).join("a.txt")).unwrap(),
            b"one"
        );
        assert_eq!(
            std::fs::read_dir(service.paths().versions_dir(1)).unwrap().count(),
            0
        );
    }
}

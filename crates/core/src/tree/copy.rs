//! Copy and move.
//!
//! A copy of a folder lands *inside* the destination: copying `a` into `b`
//! yields `b/a`, merging into an existing `b/a` if there is one. A move is a
//! copy followed, in the same transaction, by permanent deletion of the
//! source subtree. Deleted blobs are first renamed into the temp area and
//! only purged once the catalog has committed, so an unwind can still rename
//! them back.

use super::{Content, CopyNodeResult, NewContent, Outcome, TreeService};
use crate::catalog::{FileNode, FileNodeRepository, FileVersion, LockType, VersionRepository};
use crate::locks::{LockManager, LockOutcome};
use crate::operations::{FileOperation, Location};
use crate::transaction::Transaction;
use crate::CoreResult;
use futures::future::BoxFuture;
use stash_types::NodeName;
use tokio_util::sync::CancellationToken;

impl TreeService {
    /// Copies a file or folder into the folder `destination_id`.
    pub async fn copy_node(
        &self,
        user_id: i64,
        source_id: i64,
        destination_id: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<CopyNodeResult> {
        let mut tx = self.begin(user_id).await?;
        let result = self
            .copy_in(&mut tx, source_id, destination_id, cancel)
            .await;
        self.finish(tx, result, cancel).await
    }

    /// Moves a file or folder into the folder `destination_id`.
    pub async fn move_node(
        &self,
        user_id: i64,
        source_id: i64,
        destination_id: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<CopyNodeResult> {
        let mut tx = self.begin(user_id).await?;
        let result = self
            .move_in(&mut tx, source_id, destination_id, cancel)
            .await;
        self.finish(tx, result, cancel).await
    }

    async fn copy_in(
        &self,
        tx: &mut Transaction,
        source_id: i64,
        destination_id: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<CopyNodeResult> {
        let (source, destination) =
            match self.resolve_copy(tx, source_id, destination_id, LockType::Copy).await? {
                Ok(pair) => pair,
                Err(rejected) => return Ok(rejected),
            };
        let outcome = self.copy_node_into(tx, &source, &destination, cancel).await?;
        if outcome.is_success() {
            tracing::info!(
                "copied {} into '{}' for user {}",
                source.filesystem_path,
                destination.filesystem_path,
                tx.user_id()
            );
        }
        Ok(outcome)
    }

    async fn move_in(
        &self,
        tx: &mut Transaction,
        source_id: i64,
        destination_id: i64,
        cancel: &CancellationToken,
    ) -> CoreResult<CopyNodeResult> {
        let (source, destination) =
            match self.resolve_copy(tx, source_id, destination_id, LockType::Move).await? {
                Ok(pair) => pair,
                Err(rejected) => return Ok(rejected),
            };
        if source.parent_id == Some(destination.id) {
            return Ok(CopyNodeResult::Success(source));
        }

        let outcome = self.copy_node_into(tx, &source, &destination, cancel).await?;
        if outcome.is_success() {
            self.purge_node(tx, &source, cancel).await?;
            tracing::info!(
                "moved {} into '{}' for user {}",
                source.filesystem_path,
                destination.filesystem_path,
                tx.user_id()
            );
        }
        Ok(outcome)
    }

    /// Loads and validates both ends of a copy or move and locks the source.
    async fn resolve_copy(
        &self,
        tx: &mut Transaction,
        source_id: i64,
        destination_id: i64,
        lock_type: LockType,
    ) -> CoreResult<Result<(FileNode, FileNode), CopyNodeResult>> {
        let user_id = tx.user_id();
        let source = match FileNodeRepository::get(tx.conn()?, user_id, source_id).await? {
            Some(node) if !node.is_root() => node,
            _ => return Ok(Err(CopyNodeResult::SourceNotFound)),
        };
        let destination = FileNodeRepository::get(tx.conn()?, user_id, destination_id).await?;
        let Some(destination) = destination.filter(FileNode::is_folder) else {
            return Ok(Err(CopyNodeResult::DestinationNotFound));
        };
        if FileNodeRepository::is_within(tx.conn()?, user_id, destination.id, source.id).await? {
            return Ok(Err(CopyNodeResult::DestinationInsideSource));
        }
        if let LockOutcome::Held(_) = LockManager::acquire(tx, source.id, lock_type).await? {
            return Ok(Err(CopyNodeResult::Locked));
        }
        Ok(Ok((source, destination)))
    }

    /// Copies `source` as a child of `destination`, recursing into folders.
    ///
    /// The first child that cannot be copied decides the outcome; the caller
    /// rolls back everything copied before it.
    fn copy_node_into<'a>(
        &'a self,
        tx: &'a mut Transaction,
        source: &'a FileNode,
        destination: &'a FileNode,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CoreResult<CopyNodeResult>> {
        Box::pin(async move {
            let user_id = tx.user_id();
            let name = NodeName::new(&source.title)?;
            let existing = FileNodeRepository::get_child_by_title(
                tx.conn()?,
                user_id,
                destination.id,
                name.as_str(),
            )
            .await?;

            if source.is_file() {
                let content = NewContent {
                    content: Content::CopyFrom(Location::Live(source.filesystem_path.clone())),
                    size: source.size,
                    mime_type: source.mime_type.clone(),
                    hash_sum: source.hash_sum.clone(),
                };
                return Ok(match existing {
                    Some(found) if found.is_folder() => CopyNodeResult::CopyFileOverFolderError,
                    Some(found) if found.id == source.id => CopyNodeResult::Success(found),
                    Some(found) => {
                        CopyNodeResult::Success(self.overwrite(tx, &found, content, cancel).await?)
                    }
                    None => {
                        let version = source.version;
                        let node = self
                            .create_file_node(tx, destination, &name, content, version, cancel)
                            .await?;
                        self.copy_history(tx, source, &node, cancel).await?;
                        CopyNodeResult::Success(node)
                    }
                });
            }

            let folder = match existing {
                Some(found) if found.is_file() => {
                    return Ok(CopyNodeResult::CopyFolderOverFileError)
                }
                Some(found) => found,
                None => self.create_folder_node(tx, destination, &name, cancel).await?,
            };
            let children = FileNodeRepository::children(tx.conn()?, user_id, source.id).await?;
            for child in &children {
                let outcome = self.copy_node_into(tx, child, &folder, cancel).await?;
                if !outcome.is_success() {
                    return Ok(outcome);
                }
            }
            Ok(CopyNodeResult::Success(folder))
        })
    }

    /// Gives `copy` its own blobs for every stored version of `source`.
    async fn copy_history(
        &self,
        tx: &mut Transaction,
        source: &FileNode,
        copy: &FileNode,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        let versions = VersionRepository::list(tx.conn()?, source.user_id, source.id).await?;
        for version in versions {
            let blob = self.paths.new_blob_name();
            tx.execute(
                FileOperation::copy_file(
                    Location::Version(version.blob()?),
                    Location::Version(blob),
                ),
                cancel,
            )
            .await?;
            VersionRepository::insert(
                tx.conn()?,
                &FileVersion {
                    id: copy.id,
                    file_name: blob.to_string(),
                    ..version
                },
            )
            .await?;
        }
        Ok(())
    }

    /// Permanently removes `node` and its subtree: rows, versions and blobs.
    async fn purge_node(
        &self,
        tx: &mut Transaction,
        node: &FileNode,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        let user_id = tx.user_id();
        let subtree = FileNodeRepository::subtree(tx.conn()?, user_id, node.id).await?;
        for file in subtree.iter().filter(|n| n.is_file()) {
            for version in VersionRepository::list(tx.conn()?, user_id, file.id).await? {
                let staged = Location::Temp(self.paths.new_blob_name());
                let blob = Location::Version(version.blob()?);
                tx.execute(FileOperation::rename_entry(blob, staged.clone()), cancel)
                    .await?;
                tx.purge_after_commit(staged);
            }
            VersionRepository::delete_all(tx.conn()?, user_id, file.id).await?;
        }

        let staged = Location::Temp(self.paths.new_blob_name());
        let live = Location::Live(node.filesystem_path.clone());
        tx.execute(FileOperation::rename_entry(live, staged.clone()), cancel)
            .await?;
        tx.purge_after_commit(staged);
        FileNodeRepository::delete_subtree(tx.conn()?, user_id, node.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, FailingFileSystem};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Asserts `file` is still live with content `live` and one intact
    /// stored version.
    async fn assert_source_intact(service: &TreeService, file: &FileNode, live: &[u8]) {
        let current = service.get_node(1, file.id).await.unwrap().unwrap();
        assert_eq!(current.filesystem_path, file.filesystem_path);
        assert_eq!(current.version, file.version);
        assert_eq!(
            std::fs::read(service.paths().user_root(1).join(&file.filesystem_path)).unwrap(),
            live
        );
        let versions = service.versions(1, file.id).await.unwrap();
        assert_eq!(versions.len(), 1);
        let blob = service.paths().version_file(1, &versions[0].blob().unwrap());
        assert!(blob.is_file());
    }

    fn success(result: CopyNodeResult) -> FileNode {
        match result {
            CopyNodeResult::Success(node) => node,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_copy_file_duplicates_history() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let cancel = CancellationToken::new();
        let dest = test_support::folder(&service, 0, "dest").await;
        test_support::upload(&service, 0, "a.txt", b"one").await;
        let source = test_support::upload(&service, 0, "a.txt", b"two").await;

        let copy = success(service.copy_node(1, source.id, dest.id, &cancel).await.unwrap());

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.version, 2);
        assert_eq!(copy.filesystem_path, "dest/a.txt");
        let original = service.versions(1, source.id).await.unwrap();
        let copied = service.versions(1, copy.id).await.unwrap();
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].version, 1);
        assert_ne!(copied[0].file_name, original[0].file_name);
        let blob = service.paths().version_file(1, &copied[0].blob().unwrap());
        assert_eq!(std::fs::read(blob).unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_copy_folder_nests_under_destination() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let a = test_support::folder(&service, 0, "a").await;
        let b = test_support::folder(&service, 0, "b").await;
        test_support::upload(&service, a.id, "x.txt", b"x").await;

        let copy = success(
            service
                .copy_node(1, a.id, b.id, &CancellationToken::new())
                .await
                .unwrap(),
        );

        assert_eq!(copy.filesystem_path, "b/a");
        let children = service.children(1, copy.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].filesystem_path, "b/a/x.txt");
        assert!(service.paths().user_root(1).join("b/a/x.txt").is_file());
        assert!(service.paths().user_root(1).join("a/x.txt").is_file());
    }

    #[tokio::test]
    async fn test_copy_into_own_subtree_is_rejected() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let cancel = CancellationToken::new();
        let a = test_support::folder(&service, 0, "a").await;
        let inner = test_support::folder(&service, a.id, "inner").await;

        assert_eq!(
            service.copy_node(1, a.id, a.id, &cancel).await.unwrap(),
            CopyNodeResult::DestinationInsideSource
        );
        assert_eq!(
            service.move_node(1, a.id, inner.id, &cancel).await.unwrap(),
            CopyNodeResult::DestinationInsideSource
        );
        assert_eq!(
            service.copy_node(1, 0, a.id, &cancel).await.unwrap(),
            CopyNodeResult::SourceNotFound
        );
    }

    #[tokio::test]
    async fn test_child_conflict_rolls_back_whole_copy() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let a = test_support::folder(&service, 0, "a").await;
        let b = test_support::folder(&service, 0, "b").await;
        // Folders are copied first, so `c` is copied before `z.txt` conflicts.
        let c = test_support::folder(&service, a.id, "c").await;
        test_support::upload(&service, c.id, "inner.txt", b"inner").await;
        test_support::upload(&service, a.id, "z.txt", b"z").await;
        let target = test_support::folder(&service, b.id, "a").await;
        test_support::folder(&service, target.id, "z.txt").await;

        assert_eq!(
            service
                .copy_node(1, a.id, b.id, &CancellationToken::new())
                .await
                .unwrap(),
            CopyNodeResult::CopyFileOverFolderError
        );
        let titles: Vec<_> = service
            .children(1, target.id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, ["z.txt"]);
        assert!(!service.paths().user_root(1).join("b/a/c").exists());
    }

    #[tokio::test]
    async fn test_copy_file_over_folder_is_rejected() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let file = test_support::upload(&service, 0, "same", b"f").await;
        let dest = test_support::folder(&service, 0, "dest").await;
        test_support::folder(&service, dest.id, "same").await;

        assert_eq!(
            service
                .copy_node(1, file.id, dest.id, &CancellationToken::new())
                .await
                .unwrap(),
            CopyNodeResult::CopyFileOverFolderError
        );
    }

    #[tokio::test]
    async fn test_move_removes_source_and_keeps_history() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let docs = test_support::folder(&service, 0, "docs").await;
        let dest = test_support::folder(&service, 0, "dest").await;
        test_support::upload(&service, docs.id, "a.txt", b"one").await;
        let file = test_support::upload(&service, docs.id, "a.txt", b"two").await;

        let moved = success(
            service
                .move_node(1, docs.id, dest.id, &CancellationToken::new())
                .await
                .unwrap(),
        );

        assert_eq!(moved.filesystem_path, "dest/docs");
        assert!(service.get_node(1, docs.id).await.unwrap().is_none());
        assert!(service.get_node(1, file.id).await.unwrap().is_none());
        assert!(service.versions(1, file.id).await.unwrap().is_empty());

        let moved_file = &service.children(1, moved.id).await.unwrap()[0];
        assert_eq!(moved_file.version, 2);
        assert_eq!(service.versions(1, moved_file.id).await.unwrap().len(), 1);

        let paths = service.paths();
        assert!(!paths.user_root(1).join("docs").exists());
        assert_eq!(
            std::fs::read(paths.user_root(1).join("dest/docs/a.txt")).unwrap(),
            b"two"
        );
        assert_eq!(std::fs::read_dir(paths.versions_dir(1)).unwrap().count(), 1);
        assert_eq!(std::fs::read_dir(paths.temp_dir(1)).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_move_into_current_parent_is_noop() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let file = test_support::upload(&service, 0, "a.txt", b"a").await;

        let moved = success(
            service
                .move_node(1, file.id, 0, &CancellationToken::new())
                .await
                .unwrap(),
        );
        assert_eq!(moved.id, file.id);
        assert!(service.paths().user_root(1).join("a.txt").is_file());
    }

    #[tokio::test]
    async fn test_move_conflict_keeps_source() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let dest = test_support::folder(&service, 0, "dest").await;
        test_support::folder(&service, dest.id, "a.txt").await;
        test_support::upload(&service, 0, "a.txt", b"one").await;
        let file = test_support::upload(&service, 0, "a.txt", b"two").await;

        assert_eq!(
            service
                .move_node(1, file.id, dest.id, &CancellationToken::new())
                .await
                .unwrap(),
            CopyNodeResult::CopyFileOverFolderError
        );

        assert_source_intact(&service, &file, b"two").await;
        let dest_children = service.children(1, dest.id).await.unwrap();
        assert_eq!(dest_children.len(), 1);
        assert!(dest_children[0].is_folder());
    }

    #[tokio::test]
    async fn test_move_io_failure_keeps_source() {
        for fail_at in 2..=4 {
            let temp = TempDir::new().unwrap();
            let fs = Arc::new(FailingFileSystem::new());
            let service = test_support::service_with(&temp, fs.clone()).await;
            let dest = test_support::folder(&service, 0, "dest").await;
            test_support::upload(&service, 0, "a.txt", b"one").await;
            let file = test_support::upload(&service, 0, "a.txt", b"two").await;
            fs.arm(fail_at);

            let result = service
                .move_node(1, file.id, dest.id, &CancellationToken::new())
                .await;

            assert!(result.is_err(), "call {} did not fail the move", fail_at);
            assert_source_intact(&service, &file, b"two").await;
            assert!(service.children(1, dest.id).await.unwrap().is_empty());
            assert_eq!(
                std::fs::read_dir(service.paths().versions_dir(1)).unwrap().count(),
                1
            );
        }
    }
}

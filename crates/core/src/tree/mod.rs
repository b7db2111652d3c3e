//! Tree mutation service.
//!
//! Every mutation runs as one saga: a catalog transaction plus the filesystem
//! operations recorded by [`Transaction`]. Catalog conflicts come back as
//! typed results and roll back whatever the saga had already done; I/O and
//! database failures come back as [`crate::CoreError`] after the same unwind.
//!
//! Each public mutation follows one shape:
//!
//! ```text
//! begin(user) -> <mutation>_in(&mut tx, ...) -> finish(tx, result)
//! ```
//!
//! where `finish` commits only a success outcome. Read-only queries borrow a
//! pooled connection and never open a saga.

mod bulk;
mod content;
mod copy;
mod favorites;
mod folders;
mod rename;
mod results;
mod trash;
mod upload;

pub use bulk::BatchItem;
pub use content::{Content, NewContent};
pub use results::{
    CopyNodeResult, CreateFolderResult, DeleteNodeResult, FavoriteResult, Outcome,
    RenameNodeResult, RestoreTrashResult, RestoreVersionResult, UploadFileResult,
};
pub use upload::UploadRequest;

use crate::catalog::{
    Catalog, FileNode, FileNodeRepository, FileVersion, ListedNode, NodeQuery, Sorting,
    TrashNode, TrashRepository, VersionRepository,
};
use crate::config::CoreConfig;
use crate::operations::{Location, OperationContext};
use crate::transaction::Transaction;
use crate::CoreResult;
use stash_files::{FileSystem, LocalFileSystem, PathResolver, SYSTEM_DIR_NAME};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Entry point for every tree mutation and query.
#[derive(Clone, Debug)]
pub struct TreeService {
    cfg: Arc<CoreConfig>,
    catalog: Catalog,
    paths: Arc<PathResolver>,
    fs: Arc<dyn FileSystem>,
}

impl TreeService {
    /// Wires a service over an already connected catalog.
    pub fn new(cfg: CoreConfig, catalog: Catalog, fs: Arc<dyn FileSystem>) -> CoreResult<Self> {
        let paths = PathResolver::new(cfg.data_dir())?;
        Ok(Self {
            cfg: Arc::new(cfg),
            catalog,
            paths: Arc::new(paths),
            fs,
        })
    }

    /// Creates the data directory's system area, connects the catalog and
    /// uses the local filesystem.
    pub async fn open(cfg: CoreConfig) -> CoreResult<Self> {
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
        fs.create_dir_all(&cfg.data_dir().join(SYSTEM_DIR_NAME))
            .await?;
        let catalog = Catalog::connect(&cfg).await?;
        Self::new(cfg, catalog, fs)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn context(&self, user_id: i64) -> OperationContext {
        OperationContext {
            user_id,
            paths: Arc::clone(&self.paths),
            fs: Arc::clone(&self.fs),
        }
    }

    /// Creates the user's directories and root folder. Safe to repeat.
    pub async fn init_user(&self, user_id: i64) -> CoreResult<FileNode> {
        for dir in self.paths.user_dirs(user_id) {
            self.fs.create_dir_all(&dir).await?;
        }
        let root = self.catalog.ensure_root(user_id).await?;
        tracing::info!(
            "user {} initialised at {}",
            user_id,
            self.paths.user_root(user_id).display()
        );
        Ok(root)
    }

    async fn begin(&self, user_id: i64) -> CoreResult<Transaction> {
        self.catalog.begin(self.context(user_id)).await
    }

    /// Commits a success, rolls back anything else.
    async fn finish<T: Outcome>(
        &self,
        tx: Transaction,
        result: CoreResult<T>,
        cancel: &CancellationToken,
    ) -> CoreResult<T> {
        match result {
            Ok(outcome) if outcome.is_success() => {
                tx.commit(cancel).await?;
                Ok(outcome)
            }
            Ok(outcome) => {
                tx.rollback().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!("rollback after '{}' failed: {}", e, rollback);
                }
                Err(e)
            }
        }
    }

    pub async fn get_node(&self, user_id: i64, node_id: i64) -> CoreResult<Option<FileNode>> {
        let mut conn = self.catalog.acquire().await?;
        FileNodeRepository::get(&mut conn, user_id, node_id).await
    }

    pub async fn children(&self, user_id: i64, folder_id: i64) -> CoreResult<Vec<FileNode>> {
        let mut conn = self.catalog.acquire().await?;
        FileNodeRepository::children(&mut conn, user_id, folder_id).await
    }

    /// Children of `folder_id` in `sorting` order, flagged when favorite.
    pub async fn list_children(
        &self,
        user_id: i64,
        folder_id: i64,
        sorting: &Sorting,
    ) -> CoreResult<Vec<ListedNode>> {
        let mut conn = self.catalog.acquire().await?;
        FileNodeRepository::list(&mut conn, user_id, folder_id, sorting).await
    }

    pub async fn search(&self, user_id: i64, query: &NodeQuery) -> CoreResult<Vec<FileNode>> {
        let mut conn = self.catalog.acquire().await?;
        FileNodeRepository::search(&mut conn, user_id, query).await
    }

    /// Path from the root down to `node_id`.
    pub async fn breadcrumbs(&self, user_id: i64, node_id: i64) -> CoreResult<Vec<FileNode>> {
        let mut conn = self.catalog.acquire().await?;
        FileNodeRepository::ancestors(&mut conn, user_id, node_id).await
    }

    pub async fn versions(&self, user_id: i64, node_id: i64) -> CoreResult<Vec<FileVersion>> {
        let mut conn = self.catalog.acquire().await?;
        VersionRepository::list(&mut conn, user_id, node_id).await
    }

    pub async fn trash(&self, user_id: i64) -> CoreResult<Vec<TrashNode>> {
        let mut conn = self.catalog.acquire().await?;
        TrashRepository::list(&mut conn, user_id).await
    }

    /// Opens the live content of a file, or one of its stored versions.
    ///
    /// Returns `None` if the node is missing, is a folder, or has no such
    /// version.
    pub async fn open_file(
        &self,
        user_id: i64,
        node_id: i64,
        version: Option<i64>,
    ) -> CoreResult<Option<Box<dyn AsyncRead + Send + Unpin>>> {
        let location = {
            let mut conn = self.catalog.acquire().await?;
            let Some(node) = FileNodeRepository::get(&mut conn, user_id, node_id).await? else {
                return Ok(None);
            };
            if !node.is_file() {
                return Ok(None);
            }
            match version {
                None => Location::Live(node.filesystem_path),
                Some(v) if v == node.version => Location::Live(node.filesystem_path),
                Some(v) => match VersionRepository::get(&mut conn, user_id, node_id, v).await? {
                    Some(stored) => Location::Version(stored.blob()?),
                    None => return Ok(None),
                },
            }
        };
        let path = location.resolve(&self.context(user_id))?;
        Ok(Some(self.fs.open_read(&path).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NodeType, SortColumn, SortDirection};
    use crate::test_support;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_init_user_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;

        let root = service.init_user(1).await.unwrap();
        assert_eq!(root.id, 0);
        assert_eq!(root.title, "ROOT");
        assert!(service.paths().trash_dir(1).is_dir());
        assert!(service.children(1, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_breadcrumbs_run_root_first() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let a = test_support::folder(&service, 0, "a").await;
        let b = test_support::folder(&service, a.id, "b").await;

        let titles: Vec<_> = service
            .breadcrumbs(1, b.id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, ["ROOT", "a", "b"]);
    }

    #[tokio::test]
    async fn test_open_file_reads_live_and_versions() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let node = test_support::upload(&service, 0, "a.txt", b"one").await;
        test_support::upload(&service, 0, "a.txt", b"two").await;

        let mut live = String::new();
        service
            .open_file(1, node.id, None)
            .await
            .unwrap()
            .unwrap()
            .read_to_string(&mut live)
            .await
            .unwrap();
        assert_eq!(live, "two");

        let mut first = String::new();
        service
            .open_file(1, node.id, Some(1))
            .await
            .unwrap()
            .unwrap()
            .read_to_string(&mut first)
            .await
            .unwrap();
        assert_eq!(first, "one");

        assert!(service.open_file(1, 0, None).await.unwrap().is_none());
        assert!(service.open_file(1, node.id, Some(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_children_sorts_by_requested_column() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        test_support::upload(&service, 0, "b.txt", b"bbbbbb").await;
        test_support::upload(&service, 0, "a.txt", b"aaa").await;
        test_support::upload(&service, 0, "c.txt", b"c").await;
        test_support::folder(&service, 0, "z").await;

        let titles = |nodes: Vec<ListedNode>| -> Vec<String> {
            nodes.into_iter().map(|l| l.node.title).collect()
        };
        let by_default = service
            .list_children(1, 0, &Sorting::default())
            .await
            .unwrap();
        assert_eq!(titles(by_default), ["z", "a.txt", "b.txt", "c.txt"]);

        let by_size = service
            .list_children(1, 0, &Sorting::new(SortColumn::Size, SortDirection::Desc))
            .await
            .unwrap();
        assert_eq!(titles(by_size), ["b.txt", "a.txt", "c.txt", "z"]);

        let by_title = service
            .list_children(1, 0, &Sorting::new(SortColumn::Title, SortDirection::Asc))
            .await
            .unwrap();
        assert_eq!(titles(by_title), ["a.txt", "b.txt", "c.txt", "z"]);
    }

    #[tokio::test]
    async fn test_search_combines_filters() {
        let temp = TempDir::new().unwrap();
        let service = test_support::service(&temp).await;
        let reports = test_support::folder(&service, 0, "Reports").await;
        test_support::upload(&service, reports.id, "report-2024.txt", b"12345").await;
        test_support::upload(&service, 0, "report-draft.txt", b"1").await;
        test_support::upload(&service, 0, "50%_off.txt", b"sale").await;
        test_support::upload(&service, 0, "500_off.txt", b"nope").await;

        async fn search(service: &TreeService, query: NodeQuery) -> Vec<String> {
            let found = service.search(1, &query).await.unwrap();
            found.into_iter().map(|n| n.title).collect()
        }

        assert_eq!(
            search(&service, NodeQuery {
                title: Some("REPORT".into()),
                ..Default::default()
            })
            .await,
            ["Reports", "report-2024.txt", "report-draft.txt"]
        );
        assert_eq!(
            search(&service, NodeQuery {
                title: Some("report".into()),
                node_type: Some(NodeType::File),
                min_size: Some(2),
                ..Default::default()
            })
            .await,
            ["report-2024.txt"]
        );
        assert_eq!(
            search(&service, NodeQuery {
                parent_id: Some(0),
                max_size: Some(1),
                ..Default::default()
            })
            .await,
            ["Reports", "report-draft.txt"]
        );
        assert_eq!(
            search(&service, NodeQuery {
                title: Some("%_".into()),
                ..Default::default()
            })
            .await,
            ["50%_off.txt"]
        );
        assert!(service
            .search(2, &NodeQuery::default())
            .await
            .unwrap()
            .is_empty());
    }
}

//! Fixtures shared by the unit tests of this crate.

use crate::catalog::{Catalog, FileNode, FileNodeLock, LockRepository, LockType};
use crate::config::CoreConfig;
use crate::tree::{CreateFolderResult, TreeService, UploadFileResult, UploadRequest};
use async_trait::async_trait;
use sqlx::SqliteConnection;
use stash_files::{FileSystem, LocalFileSystem};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// The user every fixture acts for.
pub(crate) const USER: i64 = 1;

/// [`LocalFileSystem`] that fails exactly one mutating call once armed.
#[derive(Debug, Default)]
pub(crate) struct FailingFileSystem {
    inner: LocalFileSystem,
    calls: AtomicUsize,
    fail_at: AtomicUsize,
}

impl FailingFileSystem {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails the `k`-th mutating call from now on, counting from 1.
    pub(crate) fn arm(&self, k: usize) {
        self.calls.store(0, Ordering::SeqCst);
        self.fail_at.store(k, Ordering::SeqCst);
    }

    fn tick(&self, call: &str) -> io::Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_at.load(Ordering::SeqCst) {
            return Err(io::Error::other(format!("injected failure in {}", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl FileSystem for FailingFileSystem {
    async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> io::Result<u64> {
        self.tick("copy_file")?;
        self.inner.copy_file(source, destination, cancel).await
    }

    async fn delete_file(&self, target: &Path) -> io::Result<()> {
        self.tick("delete_file")?;
        self.inner.delete_file(target).await
    }

    async fn create_dir(&self, target: &Path) -> io::Result<()> {
        self.tick("create_dir")?;
        self.inner.create_dir(target).await
    }

    async fn create_dir_all(&self, target: &Path) -> io::Result<()> {
        self.tick("create_dir_all")?;
        self.inner.create_dir_all(target).await
    }

    async fn delete_empty_dir(&self, target: &Path) -> io::Result<()> {
        self.tick("delete_empty_dir")?;
        self.inner.delete_empty_dir(target).await
    }

    async fn delete_dir_all(&self, target: &Path) -> io::Result<()> {
        self.tick("delete_dir_all")?;
        self.inner.delete_dir_all(target).await
    }

    async fn rename(&self, source: &Path, destination: &Path) -> io::Result<()> {
        self.tick("rename")?;
        self.inner.rename(source, destination).await
    }

    async fn write_stream(
        &self,
        target: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        append: bool,
        cancel: &CancellationToken,
    ) -> io::Result<u64> {
        self.tick("write_stream")?;
        self.inner.write_stream(target, reader, append, cancel).await
    }

    async fn open_read(&self, target: &Path) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        self.inner.open_read(target).await
    }

    async fn file_size(&self, target: &Path) -> io::Result<u64> {
        self.inner.file_size(target).await
    }

    async fn exists(&self, target: &Path) -> io::Result<bool> {
        self.inner.exists(target).await
    }
}

pub(crate) async fn service(temp: &TempDir) -> TreeService {
    service_with(temp, Arc::new(LocalFileSystem::new())).await
}

/// A service over a fresh catalog in `temp` with [`USER`] initialised.
pub(crate) async fn service_with(temp: &TempDir, fs: Arc<dyn FileSystem>) -> TreeService {
    build(temp, fs, 1).await
}

/// Like [`service`], with `connections` pooled catalog connections.
pub(crate) async fn pooled_service(temp: &TempDir, connections: u32) -> TreeService {
    build(temp, Arc::new(LocalFileSystem::new()), connections).await
}

async fn build(temp: &TempDir, fs: Arc<dyn FileSystem>, connections: u32) -> TreeService {
    let url = format!("sqlite://{}", temp.path().join("catalog.db").display());
    let cfg = CoreConfig::new(temp.path().join("data"), url, connections, 3).unwrap();
    let catalog = Catalog::connect(&cfg).await.unwrap();
    let service = TreeService::new(cfg, catalog, fs).unwrap();
    service.init_user(USER).await.unwrap();
    service
}

pub(crate) async fn folder(service: &TreeService, parent_id: i64, name: &str) -> FileNode {
    match service
        .create_folder(USER, parent_id, name, &CancellationToken::new())
        .await
        .unwrap()
    {
        CreateFolderResult::Success(node) => node,
        other => panic!("creating folder {} failed: {:?}", name, other),
    }
}

pub(crate) async fn try_upload(
    service: &TreeService,
    parent_id: i64,
    name: &str,
    bytes: &[u8],
) -> UploadFileResult {
    let request = UploadRequest {
        upload_id: None,
        chunk_index: 0,
        parent_id,
        file_name: name.to_owned(),
        mime_type: None,
        file_size: bytes.len() as u64,
        hash_sum: None,
    };
    let mut reader = bytes;
    service
        .upload_last_chunk(USER, request, &mut reader, &CancellationToken::new())
        .await
        .unwrap()
}

/// Uploads `bytes` as a single chunk, creating or overwriting `name`.
pub(crate) async fn upload(
    service: &TreeService,
    parent_id: i64,
    name: &str,
    bytes: &[u8],
) -> FileNode {
    match try_upload(service, parent_id, name, bytes).await {
        UploadFileResult::Success(node) => node,
        other => panic!("uploading {} failed: {:?}", name, other),
    }
}

/// Inserts a committed lock row, as a concurrent writer would.
pub(crate) async fn insert_lock(conn: &mut SqliteConnection, node_id: i64) {
    let lock = FileNodeLock {
        user_id: USER,
        id: node_id,
        write_lock: true,
        lock_type: LockType::Copy,
    };
    LockRepository::insert(conn, &lock).await.unwrap();
}

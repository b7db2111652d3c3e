//! Capability surface over the physical filesystem.
//!
//! Every other component reaches the disk through [`FileSystem`], which keeps
//! the saga layer testable: a test double can fail any individual call.
//!
//! Deleting something that is already gone succeeds. Compensations rely on
//! this, because a partially executed forward step may or may not have
//! created its target.

use crate::constants::COPY_BUFFER_SIZE;
use async_trait::async_trait;
use std::fmt::Debug;
use std::io::{self, ErrorKind};
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait FileSystem: Send + Sync + Debug {
    /// Streams `source` into `destination`, replacing it if present.
    ///
    /// Parent directories of `destination` are created. Returns the number of
    /// bytes copied. Fails with [`ErrorKind::Interrupted`] if `cancel` fires
    /// mid-copy; the partial destination is left for the caller to clean up.
    async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> io::Result<u64>;

    async fn delete_file(&self, target: &Path) -> io::Result<()>;

    /// Creates a single directory. Fails if it already exists.
    async fn create_dir(&self, target: &Path) -> io::Result<()>;

    /// Creates a directory and any missing parents. Succeeds if present.
    async fn create_dir_all(&self, target: &Path) -> io::Result<()>;

    /// Removes a directory only if it is empty.
    async fn delete_empty_dir(&self, target: &Path) -> io::Result<()>;

    async fn delete_dir_all(&self, target: &Path) -> io::Result<()>;

    /// Renames a file or directory, creating the destination's parent.
    async fn rename(&self, source: &Path, destination: &Path) -> io::Result<()>;

    /// Drains `reader` into `target`, truncating unless `append` is set.
    async fn write_stream(
        &self,
        target: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        append: bool,
        cancel: &CancellationToken,
    ) -> io::Result<u64>;

    async fn open_read(&self, target: &Path) -> io::Result<Box<dyn AsyncRead + Send + Unpin>>;

    async fn file_size(&self, target: &Path) -> io::Result<u64>;

    async fn exists(&self, target: &Path) -> io::Result<bool>;
}

/// [`FileSystem`] backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

async fn ensure_parent(target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn ignore_missing(target: &Path, result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("{} already gone", target.display());
            Ok(())
        }
        other => other,
    }
}

async fn pump<R, W>(reader: &mut R, writer: &mut W, cancel: &CancellationToken) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(io::Error::new(ErrorKind::Interrupted, "copy cancelled"));
        }
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read]).await?;
        total += read as u64;
    }
    writer.flush().await?;
    Ok(total)
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> io::Result<u64> {
        let mut reader = fs::File::open(source).await?;
        ensure_parent(destination).await?;
        let mut writer = fs::File::create(destination).await?;
        pump(&mut reader, &mut writer, cancel).await
    }

    async fn delete_file(&self, target: &Path) -> io::Result<()> {
        ignore_missing(target, fs::remove_file(target).await)
    }

    async fn create_dir(&self, target: &Path) -> io::Result<()> {
        fs::create_dir(target).await
    }

    async fn create_dir_all(&self, target: &Path) -> io::Result<()> {
        fs::create_dir_all(target).await
    }

    async fn delete_empty_dir(&self, target: &Path) -> io::Result<()> {
        ignore_missing(target, fs::remove_dir(target).await)
    }

    async fn delete_dir_all(&self, target: &Path) -> io::Result<()> {
        ignore_missing(target, fs::remove_dir_all(target).await)
    }

    async fn rename(&self, source: &Path, destination: &Path) -> io::Result<()> {
        ensure_parent(destination).await?;
        fs::rename(source, destination).await
    }

    async fn write_stream(
        &self,
        target: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        append: bool,
        cancel: &CancellationToken,
    ) -> io::Result<u64> {
        ensure_parent(target).await?;
        let mut writer = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(target)
            .await?;
        pump(reader, &mut writer, cancel).await
    }

    async fn open_read(&self, target: &Path) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        let file = fs::File::open(target).await?;
        Ok(Box::new(file))
    }

    async fn file_size(&self, target: &Path) -> io::Result<u64> {
        Ok(fs::metadata(target).await?.len())
    }

    async fn exists(&self, target: &Path) -> io::Result<bool> {
        fs::try_exists(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_file_creates_parent_and_replaces() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        let destination = temp.path().join("nested/deeper/b.txt");
        std::fs::write(&source, b"first").unwrap();

        let fs = LocalFileSystem::new();
        let copied = fs
            .copy_file(&source, &destination, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(copied, 5);

        std::fs::write(&source, b"2nd").unwrap();
        fs.copy_file(&source, &destination, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"2nd");
    }

    #[tokio::test]
    async fn test_copy_file_honours_cancellation() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        std::fs::write(&source, b"content").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = LocalFileSystem::new()
            .copy_file(&source, &temp.path().join("b.txt"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFileSystem::new();
        fs.delete_file(&temp.path().join("gone.txt")).await.unwrap();
        fs.delete_empty_dir(&temp.path().join("gone")).await.unwrap();
        fs.delete_dir_all(&temp.path().join("gone")).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_empty_dir_refuses_non_empty() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("full");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("x"), b"x").unwrap();

        assert!(LocalFileSystem::new().delete_empty_dir(&dir).await.is_err());
        assert!(dir.exists());
    }

    #[tokio::test]
    async fn test_create_dir_fails_when_present() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFileSystem::new();
        let dir = temp.path().join("docs");
        fs.create_dir(&dir).await.unwrap();
        assert!(fs.create_dir(&dir).await.is_err());
    }

    #[tokio::test]
    async fn test_write_stream_appends_chunks() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("uploads/x.part");
        let fs = LocalFileSystem::new();
        let cancel = CancellationToken::new();

        let mut first: &[u8] = b"hello ";
        let mut second: &[u8] = b"world";
        fs.write_stream(&target, &mut first, false, &cancel).await.unwrap();
        fs.write_stream(&target, &mut second, true, &cancel).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"hello world");
        assert_eq!(fs.file_size(&target).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_rename_moves_directory() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("folder");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("f.txt"), b"f").unwrap();
        let destination = temp.path().join("elsewhere/renamed");

        let fs = LocalFileSystem::new();
        fs.rename(&source, &destination).await.unwrap();

        assert!(!fs.exists(&source).await.unwrap());
        assert_eq!(std::fs::read(destination.join("f.txt")).unwrap(), b"f");
    }
}

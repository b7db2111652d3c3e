//! Reversible filesystem operations.
//!
//! A [`FileOperation`] is the unit of work of a saga: one forward step against
//! the [`FileSystem`] that can later be undone by the [`RevertOperation`] it
//! produces. Operations only touch the filesystem; catalog rows are written by
//! the caller through the same [`crate::transaction::Transaction`].
//!
//! Each operation moves through `NotExecuted -> Executed` and, if the saga
//! unwinds, its compensation moves it to `Reverted`. A compensation is never
//! itself reversible, which the types enforce: [`RevertOperation`] has no
//! `revert`.
//!
//! Forward steps check the cancellation token before touching anything and
//! report failure as `false` after logging it. Compensations take no token and
//! also report failure as `false`; they never panic.

use crate::{CoreError, CoreResult};
use stash_files::{FileSystem, FilesError, PathResolver};
use stash_uuid::{BlobName, UploadId};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What every operation needs to reach the disk on behalf of one user.
#[derive(Clone, Debug)]
pub struct OperationContext {
    pub user_id: i64,
    pub paths: Arc<PathResolver>,
    pub fs: Arc<dyn FileSystem>,
}

/// A physical location in one user's area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// Logical path in the live tree.
    Live(String),
    Version(BlobName),
    Trash(BlobName),
    Upload(UploadId),
    Temp(BlobName),
}

impl Location {
    pub fn resolve(&self, ctx: &OperationContext) -> Result<PathBuf, FilesError> {
        let user_id = ctx.user_id;
        Ok(match self {
            Location::Live(path) => ctx.paths.resolve_absolute(user_id, path)?,
            Location::Version(blob) => ctx.paths.version_file(user_id, blob),
            Location::Trash(blob) => ctx.paths.trash_file(user_id, blob),
            Location::Upload(id) => ctx.paths.upload_file(user_id, id),
            Location::Temp(blob) => ctx.paths.temp_file(user_id, blob),
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Live(path) => write!(f, "live:/{}", path),
            Location::Version(blob) => write!(f, "versions:{}", blob),
            Location::Trash(blob) => write!(f, "trash:{}", blob),
            Location::Upload(id) => write!(f, "uploads:{}", id),
            Location::Temp(blob) => write!(f, "temp:{}", blob),
        }
    }
}

/// Forward step of a saga.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOperation {
    CreateFolder {
        target: Location,
    },
    CopyFile {
        source: Location,
        destination: Location,
    },
    /// Copy then delete the source.
    MoveFile {
        source: Location,
        destination: Location,
        copied: bool,
        deleted: bool,
    },
    /// Snapshot live content into a version blob.
    CreateVersion {
        live: Location,
        version: Location,
    },
    MoveToTrash {
        source: Location,
        trash: Location,
        copied: bool,
        deleted: bool,
    },
    /// Copy a version blob over the live file. Not reversible.
    RestoreVersion {
        version: Location,
        live: Location,
    },
    RestoreFromTrash {
        trash: Location,
        live: Location,
        copied: bool,
        deleted: bool,
    },
    /// Atomic rename of a file or directory.
    RenameEntry {
        source: Location,
        destination: Location,
    },
    /// Remove an empty directory.
    DeleteFolder {
        target: Location,
    },
}

/// Compensating step. Runs without cancellation and cannot be reverted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevertOperation {
    RemoveFolder {
        target: Location,
    },
    DeleteCopy {
        destination: Location,
    },
    /// Undo a copy-then-delete: put the source back if it was deleted, then
    /// delete the destination.
    MoveBack {
        source: Location,
        destination: Location,
        source_deleted: bool,
    },
    RestoreSnapshot {
        live: Location,
        version: Location,
    },
    RenameBack {
        source: Location,
        destination: Location,
    },
    RecreateFolder {
        target: Location,
    },
}

impl FileOperation {
    pub fn create_folder(target: Location) -> Self {
        Self::CreateFolder { target }
    }

    pub fn copy_file(source: Location, destination: Location) -> Self {
        Self::CopyFile {
            source,
            destination,
        }
    }

    pub fn move_file(source: Location, destination: Location) -> Self {
        Self::MoveFile {
            source,
            destination,
            copied: false,
            deleted: false,
        }
    }

    pub fn create_version(live: Location, version: Location) -> Self {
        Self::CreateVersion { live, version }
    }

    pub fn move_to_trash(source: Location, trash: Location) -> Self {
        Self::MoveToTrash {
            source,
            trash,
            copied: false,
            deleted: false,
        }
    }

    pub fn restore_version(version: Location, live: Location) -> Self {
        Self::RestoreVersion { version, live }
    }

    pub fn restore_from_trash(trash: Location, live: Location) -> Self {
        Self::RestoreFromTrash {
            trash,
            live,
            copied: false,
            deleted: false,
        }
    }

    pub fn rename_entry(source: Location, destination: Location) -> Self {
        Self::RenameEntry {
            source,
            destination,
        }
    }

    pub fn delete_folder(target: Location) -> Self {
        Self::DeleteFolder { target }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateFolder { .. } => "create_folder",
            Self::CopyFile { .. } => "copy_file",
            Self::MoveFile { .. } => "move_file",
            Self::CreateVersion { .. } => "create_version",
            Self::MoveToTrash { .. } => "move_to_trash",
            Self::RestoreVersion { .. } => "restore_version",
            Self::RestoreFromTrash { .. } => "restore_from_trash",
            Self::RenameEntry { .. } => "rename_entry",
            Self::DeleteFolder { .. } => "delete_folder",
        }
    }

    /// Runs the forward step. Returns `false` on failure or cancellation.
    pub async fn execute(&mut self, ctx: &OperationContext, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            tracing::warn!(
                user_id = ctx.user_id,
                operation = self.name(),
                "cancellation requested, operation not started"
            );
            return false;
        }

        let name = self.name();
        match self.run(ctx, cancel).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    user_id = ctx.user_id,
                    operation = name,
                    error = %e,
                    "file operation failed"
                );
                false
            }
        }
    }

    async fn run(&mut self, ctx: &OperationContext, cancel: &CancellationToken) -> CoreResult<()> {
        let fs = &ctx.fs;
        match self {
            Self::CreateFolder { target } => {
                fs.create_dir(&target.resolve(ctx)?).await?;
            }
            Self::CopyFile {
                source,
                destination,
            } => {
                fs.copy_file(&source.resolve(ctx)?, &destination.resolve(ctx)?, cancel)
                    .await?;
            }
            Self::MoveFile {
                source,
                destination,
                copied,
                deleted,
            }
            | Self::MoveToTrash {
                source,
                trash: destination,
                copied,
                deleted,
            }
            | Self::RestoreFromTrash {
                trash: source,
                live: destination,
                copied,
                deleted,
            } => {
                let source = source.resolve(ctx)?;
                fs.copy_file(&source, &destination.resolve(ctx)?, cancel)
                    .await?;
                *copied = true;
                fs.delete_file(&source).await?;
                *deleted = true;
            }
            Self::CreateVersion { live, version } => {
                fs.copy_file(&live.resolve(ctx)?, &version.resolve(ctx)?, cancel)
                    .await?;
            }
            Self::RestoreVersion { version, live } => {
                fs.copy_file(&version.resolve(ctx)?, &live.resolve(ctx)?, cancel)
                    .await?;
            }
            Self::RenameEntry {
                source,
                destination,
            } => {
                fs.rename(&source.resolve(ctx)?, &destination.resolve(ctx)?)
                    .await?;
            }
            Self::DeleteFolder { target } => {
                fs.delete_empty_dir(&target.resolve(ctx)?).await?;
            }
        }
        Ok(())
    }

    /// Builds the compensation for a successfully executed step.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RevertUnsupported`] for [`FileOperation::RestoreVersion`]:
    /// undoing a restore means restoring another version, which is a new
    /// request rather than a compensation.
    pub fn revert(&self) -> CoreResult<RevertOperation> {
        Ok(match self {
            Self::CreateFolder { target } => RevertOperation::RemoveFolder {
                target: target.clone(),
            },
            Self::CopyFile { destination, .. } => RevertOperation::DeleteCopy {
                destination: destination.clone(),
            },
            Self::MoveFile {
                source,
                destination,
                deleted,
                ..
            }
            | Self::MoveToTrash {
                source,
                trash: destination,
                deleted,
                ..
            }
            | Self::RestoreFromTrash {
                trash: source,
                live: destination,
                deleted,
                ..
            } => RevertOperation::MoveBack {
                source: source.clone(),
                destination: destination.clone(),
                source_deleted: *deleted,
            },
            Self::CreateVersion { live, version } => RevertOperation::RestoreSnapshot {
                live: live.clone(),
                version: version.clone(),
            },
            Self::RestoreVersion { .. } => return Err(CoreError::RevertUnsupported(self.name())),
            Self::RenameEntry {
                source,
                destination,
            } => RevertOperation::RenameBack {
                source: source.clone(),
                destination: destination.clone(),
            },
            Self::DeleteFolder { target } => RevertOperation::RecreateFolder {
                target: target.clone(),
            },
        })
    }

    /// Cleanup for a step that failed after it started writing.
    ///
    /// Copies may leave a truncated destination and copy-then-delete steps may
    /// stop between their two halves. Single syscalls leave nothing behind.
    pub fn partial_cleanup(&self) -> Option<RevertOperation> {
        match self {
            Self::CopyFile { destination, .. } => Some(RevertOperation::DeleteCopy {
                destination: destination.clone(),
            }),
            Self::CreateVersion { version, .. } => Some(RevertOperation::DeleteCopy {
                destination: version.clone(),
            }),
            Self::MoveFile { .. } | Self::MoveToTrash { .. } | Self::RestoreFromTrash { .. } => {
                self.revert().ok()
            }
            Self::CreateFolder { .. }
            | Self::RestoreVersion { .. }
            | Self::RenameEntry { .. }
            | Self::DeleteFolder { .. } => None,
        }
    }
}

impl RevertOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RemoveFolder { .. } => "remove_folder",
            Self::DeleteCopy { .. } => "delete_copy",
            Self::MoveBack { .. } => "move_back",
            Self::RestoreSnapshot { .. } => "restore_snapshot",
            Self::RenameBack { .. } => "rename_back",
            Self::RecreateFolder { .. } => "recreate_folder",
        }
    }

    /// Runs the compensation to completion. Returns `false` on failure.
    pub async fn execute(self, ctx: &OperationContext) -> bool {
        let name = self.name();
        match self.run(ctx).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    user_id = ctx.user_id,
                    operation = name,
                    error = %e,
                    "compensation failed"
                );
                false
            }
        }
    }

    async fn run(self, ctx: &OperationContext) -> CoreResult<()> {
        let fs = &ctx.fs;
        let uncancellable = CancellationToken::new();
        match self {
            Self::RemoveFolder { target } => {
                fs.delete_empty_dir(&target.resolve(ctx)?).await?;
            }
            Self::DeleteCopy { destination } => {
                fs.delete_file(&destination.resolve(ctx)?).await?;
            }
            Self::MoveBack {
                source,
                destination,
                source_deleted,
            } => {
                let destination = destination.resolve(ctx)?;
                if source_deleted {
                    fs.copy_file(&destination, &source.resolve(ctx)?, &uncancellable)
                        .await?;
                }
                fs.delete_file(&destination).await?;
            }
            Self::RestoreSnapshot { live, version } => {
                let version_path = version.resolve(ctx)?;
                fs.copy_file(&version_path, &live.resolve(ctx)?, &uncancellable)
                    .await?;
                if let Err(e) = fs.delete_file(&version_path).await {
                    tracing::warn!(
                        user_id = ctx.user_id,
                        version = %version,
                        error = %e,
                        "snapshot restored but its version blob could not be removed"
                    );
                }
            }
            Self::RenameBack {
                source,
                destination,
            } => {
                fs.rename(&destination.resolve(ctx)?, &source.resolve(ctx)?)
                    .await?;
            }
            Self::RecreateFolder { target } => {
                fs.create_dir_all(&target.resolve(ctx)?).await?;
            }
        }
        Ok(())
    }
}

//! Typed outcomes of tree mutations.
//!
//! Catalog conflicts are reported as values, not errors: the caller asked for
//! something the tree does not allow and nothing was changed. Only the
//! `Success` variants commit.

use crate::catalog::FileNode;
use serde::Serialize;

/// Whether an outcome should commit its transaction.
pub trait Outcome {
    fn is_success(&self) -> bool;
}

macro_rules! success_outcome {
    ($($result:ident),+ $(,)?) => {
        $(
            impl Outcome for $result {
                fn is_success(&self) -> bool {
                    matches!(self, $result::Success { .. })
                }
            }
        )+
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "node")]
pub enum CreateFolderResult {
    ParentNotFound,
    FileWithSameNameExist,
    FolderWithSameNameExist,
    Success(FileNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "node")]
pub enum UploadFileResult {
    ParentNotFound,
    FolderWithSameNameExist,
    UploadError,
    Success(FileNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "node")]
pub enum RenameNodeResult {
    NodeNotFound,
    NodeWithSameNameExist,
    Locked,
    Success(FileNode),
}

/// Outcome of a copy or a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "node")]
pub enum CopyNodeResult {
    SourceNotFound,
    DestinationNotFound,
    DestinationInsideSource,
    CopyFileOverFolderError,
    CopyFolderOverFileError,
    Locked,
    Success(FileNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result")]
pub enum DeleteNodeResult {
    NodeNotFound,
    Locked,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "node")]
pub enum RestoreVersionResult {
    NodeNotFound,
    NotAFile,
    VersionNotFound,
    Locked,
    Success(FileNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "node")]
pub enum RestoreTrashResult {
    EntryNotFound,
    ParentNotFound,
    NodeWithSameNameExist,
    Success(FileNode),
}

/// Outcome of marking or unmarking a favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result")]
pub enum FavoriteResult {
    NodeNotFound,
    Success,
}

success_outcome!(
    CreateFolderResult,
    UploadFileResult,
    RenameNodeResult,
    CopyNodeResult,
    DeleteNodeResult,
    RestoreVersionResult,
    RestoreTrashResult,
);

impl CopyNodeResult {
    pub fn node(&self) -> Option<&FileNode> {
        match self {
            CopyNodeResult::Success(node) => Some(node),
            _ => None,
        }
    }
}

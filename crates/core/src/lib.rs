//! # Stash Core
//!
//! Transactional mutations of per-user file trees.
//!
//! A tree lives in two places at once: a relational catalog (SQLite) holding
//! nodes, versions, trash entries and advisory locks, and a directory
//! hierarchy on disk holding the bytes. This crate keeps the two in step:
//! - Reversible filesystem operations and their compensations ([`operations`])
//! - A saga coordinator pairing them with one catalog transaction ([`transaction`])
//! - Advisory subtree locks ([`locks`])
//! - Folder creation, chunked upload, rename, copy, move, trash and version
//!   restore ([`tree`])
//!
//! **No transport concerns**: request parsing, authentication and user
//! resolution belong to the caller. Every operation takes an explicit
//! `user_id`.
//!
//! ## Example Usage
//!
//! ```no_run
//! use stash_core::{CoreConfig, CreateFolderResult, TreeService};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> stash_core::CoreResult<()> {
//! let cfg = CoreConfig::with_data_dir("/srv/stash".into())?;
//! let service = TreeService::open(cfg).await?;
//! service.init_user(7).await?;
//!
//! let cancel = CancellationToken::new();
//! if let CreateFolderResult::Success(docs) = service.create_folder(7, 0, "docs", &cancel).await? {
//!     println!("created {}", docs.filesystem_path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod locks;
pub mod operations;
pub mod transaction;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{
    Catalog, FileNode, FileVersion, ListedNode, LockType, NodeQuery, NodeType, SortColumn,
    SortDirection, Sorting, TrashNode,
};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use tree::{
    BatchItem, CopyNodeResult, CreateFolderResult, DeleteNodeResult, FavoriteResult,
    RenameNodeResult, RestoreTrashResult, RestoreVersionResult, TreeService, UploadFileResult,
    UploadRequest,
};

//! Catalog row types.

use crate::constants::{ROOT_NODE_ID, ROOT_NODE_TITLE};
use crate::CoreResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use stash_files::FOLDER_MIME_TYPE;
use stash_uuid::BlobName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[repr(i32)]
pub enum NodeType {
    File = 0,
    Folder = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[repr(i32)]
pub enum LockType {
    Copy = 0,
    Move = 1,
    Delete = 2,
}

/// A live file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FileNode {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub parent_id: Option<i64>,
    pub node_type: NodeType,
    /// Logical path relative to the user's live root.
    pub filesystem_path: String,
    pub mime_type: String,
    pub modified_at: DateTime<Utc>,
    #[sqlx(rename = "node_size")]
    pub size: i64,
    #[sqlx(rename = "node_version")]
    pub version: i64,
    pub hash_sum: Option<String>,
}

impl FileNode {
    pub fn root(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: ROOT_NODE_ID,
            user_id,
            title: ROOT_NODE_TITLE.to_owned(),
            parent_id: None,
            node_type: NodeType::Folder,
            filesystem_path: String::new(),
            mime_type: FOLDER_MIME_TYPE.to_owned(),
            modified_at: now,
            size: 0,
            version: 1,
            hash_sum: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_folder(&self) -> bool {
        self.node_type == NodeType::Folder
    }

    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }
}

/// A prior version of a file. The live content is never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FileVersion {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(rename = "node_version")]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    #[sqlx(rename = "node_size")]
    pub size: i64,
    pub file_name: String,
}

impl FileVersion {
    pub fn blob(&self) -> CoreResult<BlobName> {
        Ok(BlobName::parse(&self.file_name)?)
    }
}

/// A trashed file, file version or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TrashNode {
    pub trash_id: i64,
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub parent_id: Option<i64>,
    pub node_type: NodeType,
    pub filesystem_path: String,
    pub mime_type: String,
    pub version_created_at: DateTime<Utc>,
    pub deleted_at: DateTime<Utc>,
    #[sqlx(rename = "node_size")]
    pub size: i64,
    #[sqlx(rename = "node_version")]
    pub version: i64,
    /// Trash blob; folders have none.
    pub file_name: Option<String>,
}

impl TrashNode {
    /// Trash row for one historical version of `node`.
    pub fn from_version(
        node: &FileNode,
        version: &FileVersion,
        offset: i64,
        blob: &BlobName,
        deleted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trash_id: 0,
            id: node.id,
            user_id: node.user_id,
            title: node.title.clone(),
            parent_id: node.parent_id,
            node_type: NodeType::File,
            filesystem_path: node.filesystem_path.clone(),
            mime_type: node.mime_type.clone(),
            version_created_at: version.created_at,
            deleted_at,
            size: version.size,
            version: version.version + offset,
            file_name: Some(blob.to_string()),
        }
    }

    /// Trash row for the live state of `node`. Folders pass no blob.
    pub fn from_live(
        node: &FileNode,
        offset: i64,
        blob: Option<&BlobName>,
        deleted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trash_id: 0,
            id: node.id,
            user_id: node.user_id,
            title: node.title.clone(),
            parent_id: node.parent_id,
            node_type: node.node_type,
            filesystem_path: node.filesystem_path.clone(),
            mime_type: node.mime_type.clone(),
            version_created_at: node.modified_at,
            deleted_at,
            size: node.size,
            version: node.version + offset,
            file_name: blob.map(BlobName::to_string),
        }
    }

    pub fn blob(&self) -> CoreResult<Option<BlobName>> {
        Ok(self
            .file_name
            .as_deref()
            .map(BlobName::parse)
            .transpose()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FileNodeLock {
    pub user_id: i64,
    pub id: i64,
    pub write_lock: bool,
    pub lock_type: LockType,
}

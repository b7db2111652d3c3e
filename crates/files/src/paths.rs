//! Mapping between logical paths and absolute paths on disk.
//!
//! Logical paths are relative to a user's live root and always use `/` as the
//! separator. The empty string is the user's root folder.

use crate::constants::{
    SYSTEM_DIR_NAME, TEMP_DIR_NAME, TRASH_DIR_NAME, UPLOADS_DIR_NAME, UPLOAD_FILE_EXTENSION,
    VERSIONS_DIR_NAME,
};
use crate::FilesError;
use stash_types::NodeName;
use stash_uuid::{BlobName, UploadId};
use std::path::{Component, Path, PathBuf};

/// Resolves every physical location the engine reads or writes.
#[derive(Clone, Debug)]
pub struct PathResolver {
    data_dir: PathBuf,
}

impl PathResolver {
    /// Creates a resolver rooted at `data_dir`.
    ///
    /// The directory does not need to exist yet; user areas are created on
    /// demand by the catalog when a user is initialised.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if `data_dir` is empty.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, FilesError> {
        let data_dir = data_dir.into();
        if data_dir.as_os_str().is_empty() {
            return Err(FilesError::InvalidRootDirectory(
                "data directory cannot be empty".into(),
            ));
        }
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Root of the user's live tree: `<data_dir>/<user_id>`.
    pub fn user_root(&self, user_id: i64) -> PathBuf {
        self.data_dir.join(user_id.to_string())
    }

    /// Root of the user's non-live areas: `<data_dir>/.system/<user_id>`.
    pub fn system_dir(&self, user_id: i64) -> PathBuf {
        self.data_dir.join(SYSTEM_DIR_NAME).join(user_id.to_string())
    }

    pub fn trash_dir(&self, user_id: i64) -> PathBuf {
        self.system_dir(user_id).join(TRASH_DIR_NAME)
    }

    pub fn versions_dir(&self, user_id: i64) -> PathBuf {
        self.system_dir(user_id).join(VERSIONS_DIR_NAME)
    }

    pub fn uploads_dir(&self, user_id: i64) -> PathBuf {
        self.system_dir(user_id).join(UPLOADS_DIR_NAME)
    }

    pub fn temp_dir(&self, user_id: i64) -> PathBuf {
        self.system_dir(user_id).join(TEMP_DIR_NAME)
    }

    /// Every directory a freshly initialised user needs.
    pub fn user_dirs(&self, user_id: i64) -> Vec<PathBuf> {
        vec![
            self.user_root(user_id),
            self.trash_dir(user_id),
            self.versions_dir(user_id),
            self.uploads_dir(user_id),
            self.temp_dir(user_id),
        ]
    }

    pub fn trash_file(&self, user_id: i64, blob: &BlobName) -> PathBuf {
        self.trash_dir(user_id).join(blob.to_string())
    }

    pub fn version_file(&self, user_id: i64, blob: &BlobName) -> PathBuf {
        self.versions_dir(user_id).join(blob.to_string())
    }

    pub fn temp_file(&self, user_id: i64, blob: &BlobName) -> PathBuf {
        self.temp_dir(user_id).join(blob.to_string())
    }

    /// Staging blob for a chunked upload: `uploads/<upload_id>.part`.
    pub fn upload_file(&self, user_id: i64, upload_id: &UploadId) -> PathBuf {
        self.uploads_dir(user_id)
            .join(format!("{}.{}", upload_id, UPLOAD_FILE_EXTENSION))
    }

    /// Fresh opaque name for a version, trash or temp blob.
    pub fn new_blob_name(&self) -> BlobName {
        BlobName::new()
    }

    /// Resolves a logical path to an absolute path inside the user's live tree.
    ///
    /// A leading `/` and `.` components are ignored.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Owner of the tree
    /// * `relative` - Logical path, for example `docs/report.pdf`
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] if the path contains `..` or a
    /// platform prefix, which could escape the user's area.
    pub fn resolve_absolute(&self, user_id: i64, relative: &str) -> Result<PathBuf, FilesError> {
        let mut absolute = self.user_root(user_id);
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => absolute.push(part),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(FilesError::InvalidPath(format!(
                        "path escapes the user area: {}",
                        relative
                    )));
                }
            }
        }
        Ok(absolute)
    }

    /// Inverse of [`PathResolver::resolve_absolute`].
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] if `absolute` is outside the user's
    /// live tree or is not valid UTF-8.
    pub fn resolve_relative(&self, user_id: i64, absolute: &Path) -> Result<String, FilesError> {
        let root = self.user_root(user_id);
        let stripped = absolute.strip_prefix(&root).map_err(|_| {
            FilesError::InvalidPath(format!(
                "{} is outside {}",
                absolute.display(),
                root.display()
            ))
        })?;

        let mut parts = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                    FilesError::InvalidPath(format!("non UTF-8 path: {}", absolute.display()))
                })?),
                Component::CurDir => {}
                _ => {
                    return Err(FilesError::InvalidPath(format!(
                        "unexpected component in {}",
                        absolute.display()
                    )))
                }
            }
        }
        Ok(parts.join("/"))
    }

    /// Logical path of a child named `name` under `parent`.
    pub fn child_path(parent: &str, name: &NodeName) -> String {
        let parent = parent.trim_end_matches('/');
        if parent.is_empty() {
            name.as_str().to_owned()
        } else {
            format!("{}/{}", parent, name)
        }
    }

    /// Logical path of the folder containing `relative`. The root's parent is the root.
    pub fn parent_path(relative: &str) -> &str {
        match relative.trim_end_matches('/').rsplit_once('/') {
            Some((parent, _)) => parent,
            None => "",
        }
    }
}

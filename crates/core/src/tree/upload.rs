//! Chunked uploads.
//!
//! Chunks are staged in `uploads/<upload_id>.part` outside any transaction.
//! Only the last chunk opens a saga, which validates the assembled blob and
//! moves it into the live tree as a new file or a new version of an existing
//! one. A failed upload never leaves a row or a staging blob behind.

use super::{Content, NewContent, Outcome, TreeService, UploadFileResult};
use crate::catalog::{FileNode, FileNodeRepository, LockType};
use crate::locks::{LockManager, LockOutcome};
use crate::operations::Location;
use crate::transaction::Transaction;
use crate::{CoreError, CoreResult};
use stash_files::{sha256_file, sniff_mime, ContentHash, UploadId};
use stash_types::NodeName;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Metadata sent with the last chunk of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Id returned by the first chunk. `None` for a single-chunk upload.
    pub upload_id: Option<UploadId>,
    pub chunk_index: u32,
    pub parent_id: i64,
    pub file_name: String,
    /// Declared media type; sniffed when absent or generic.
    pub mime_type: Option<String>,
    /// Total size of the assembled file in bytes.
    pub file_size: u64,
    /// Optional SHA-256 the client computed, in hex.
    pub hash_sum: Option<String>,
}

impl TreeService {
    /// Stages one chunk that is not the last.
    ///
    /// Chunk 0 starts a new upload and returns its id; every later chunk must
    /// pass that id and is appended in call order. A chunk that fails to
    /// write discards the whole upload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for a later chunk without a known
    /// upload id, or the I/O error that stopped the write.
    pub async fn upload_chunk(
        &self,
        user_id: i64,
        upload_id: Option<UploadId>,
        chunk_index: u32,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        cancel: &CancellationToken,
    ) -> CoreResult<UploadId> {
        let (upload_id, append) = staging_target(upload_id, chunk_index)?;
        if let Err(e) = self
            .stage_chunk(user_id, &upload_id, append, chunk_index, reader, cancel)
            .await
        {
            self.discard_upload(user_id, &upload_id).await;
            return Err(e);
        }
        Ok(upload_id)
    }

    /// Stages the last chunk and turns the assembled upload into a file.
    ///
    /// Conflicts and failures alike discard the staging blob. Storage and
    /// validation errors are logged and reported as
    /// [`UploadFileResult::UploadError`].
    pub async fn upload_last_chunk(
        &self,
        user_id: i64,
        request: UploadRequest,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        cancel: &CancellationToken,
    ) -> CoreResult<UploadFileResult> {
        let (upload_id, append) = match staging_target(request.upload_id, request.chunk_index) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(
                    "upload of {} for user {} refused: {}",
                    request.file_name,
                    user_id,
                    e
                );
                return Ok(UploadFileResult::UploadError);
            }
        };

        let staged = self
            .stage_chunk(user_id, &upload_id, append, request.chunk_index, reader, cancel)
            .await;
        let placed = match staged {
            Ok(()) => match self.assemble(user_id, &upload_id, &request).await {
                Ok((name, content)) => {
                    self.place_upload(user_id, request.parent_id, &name, content, cancel)
                        .await
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        let outcome = placed.unwrap_or_else(|e| {
            tracing::warn!(
                "upload of {} for user {} failed: {}",
                request.file_name,
                user_id,
                e
            );
            UploadFileResult::UploadError
        });
        if !outcome.is_success() {
            self.discard_upload(user_id, &upload_id).await;
        }
        Ok(outcome)
    }

    async fn stage_chunk(
        &self,
        user_id: i64,
        upload_id: &UploadId,
        append: bool,
        chunk_index: u32,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        let path = self.paths.upload_file(user_id, upload_id);
        if append && !self.fs.exists(&path).await? {
            return Err(CoreError::InvalidInput(format!(
                "unknown upload {}",
                upload_id
            )));
        }
        let written = self.fs.write_stream(&path, reader, append, cancel).await?;
        tracing::debug!(
            "staged chunk {} of upload {} ({} bytes)",
            chunk_index,
            upload_id,
            written
        );
        Ok(())
    }

    /// Validates the staged blob against the request and describes it as new
    /// content.
    async fn assemble(
        &self,
        user_id: i64,
        upload_id: &UploadId,
        request: &UploadRequest,
    ) -> CoreResult<(NodeName, NewContent)> {
        let name = NodeName::new(&request.file_name)?;
        let path = self.paths.upload_file(user_id, upload_id);

        let size = self.fs.file_size(&path).await?;
        if size != request.file_size {
            return Err(CoreError::InvalidInput(format!(
                "upload {} has {} bytes, {} declared",
                upload_id, size, request.file_size
            )));
        }
        let hash = sha256_file(&path).await?;
        if let Some(declared) = request.hash_sum.as_deref() {
            if ContentHash::parse(declared)? != hash {
                return Err(CoreError::InvalidInput(format!(
                    "upload {} does not match its declared hash",
                    upload_id
                )));
            }
        }
        let mime_type = sniff_mime(&path, request.mime_type.as_deref()).await?;

        let size = i64::try_from(size)
            .map_err(|_| CoreError::InvalidInput(format!("upload {} is too large", upload_id)))?;
        Ok((
            name,
            NewContent {
                content: Content::MoveFrom(Location::Upload(*upload_id)),
                size,
                mime_type,
                hash_sum: Some(hash.to_string()),
            },
        ))
    }

    async fn place_upload(
        &self,
        user_id: i64,
        parent_id: i64,
        name: &NodeName,
        content: NewContent,
        cancel: &CancellationToken,
    ) -> CoreResult<UploadFileResult> {
        let mut tx = self.begin(user_id).await?;
        let result = self
            .place_upload_in(&mut tx, parent_id, name, content, cancel)
            .await;
        self.finish(tx, result, cancel).await
    }

    async fn place_upload_in(
        &self,
        tx: &mut Transaction,
        parent_id: i64,
        name: &NodeName,
        content: NewContent,
        cancel: &CancellationToken,
    ) -> CoreResult<UploadFileResult> {
        let user_id = tx.user_id();
        let parent = FileNodeRepository::get(tx.conn()?, user_id, parent_id).await?;
        let Some(parent) = parent.filter(FileNode::is_folder) else {
            return Ok(UploadFileResult::ParentNotFound);
        };

        let node = match FileNodeRepository::get_child_by_title(
            tx.conn()?,
            user_id,
            parent.id,
            name.as_str(),
        )
        .await?
        {
            Some(existing) if existing.is_folder() => {
                return Ok(UploadFileResult::FolderWithSameNameExist)
            }
            Some(existing) => {
                if let LockOutcome::Held(_) =
                    LockManager::acquire(tx, existing.id, LockType::Copy).await?
                {
                    tracing::warn!("{} is locked, upload rejected", existing.filesystem_path);
                    return Ok(UploadFileResult::UploadError);
                }
                self.overwrite(tx, &existing, content, cancel).await?
            }
            None => {
                self.create_file_node(tx, &parent, name, content, 1, cancel)
                    .await?
            }
        };
        tracing::info!(
            "uploaded {} version {} for user {}",
            node.filesystem_path,
            node.version,
            user_id
        );
        Ok(UploadFileResult::Success(node))
    }

    async fn discard_upload(&self, user_id: i64, upload_id: &UploadId) {
        let path = self.paths.upload_file(user_id, upload_id);
        if let Err(e) = self.fs.delete_file(&path).await {
            tracing::warn!("staging blob of upload {} left behind: {}", upload_id, e);
        }
    }
}

/// The staging blob a chunk writes to and whether it appends.
///
/// Chunk 0 always mints a fresh id, so the caller knows the exact blob to
/// discard even when the first write fails.
fn staging_target(upload_id: Option<UploadId>, chunk_index: u32) -> CoreResult<(UploadId, bool)> {
    match (chunk_index, upload_id) {
        (0, _) => Ok((UploadId::new(), false)),
        (_, Some(id)) => Ok((id, true)),
        (index, None) => Err(CoreError::InvalidInput(format!(
            "chunk {} needs the upload id returned by chunk 0",
            index
        ))),
    }
}

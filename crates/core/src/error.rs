#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid node name: {0}")]
    InvalidName(#[from] stash_types::TextError),
    #[error("catalog error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Files(#[from] stash_files::FilesError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid blob name: {0}")]
    BlobName(#[from] stash_uuid::UuidError),

    #[error("file operation {0} failed, transaction rolled back")]
    OperationFailed(&'static str),
    #[error("file operation {0} cannot be reverted")]
    RevertUnsupported(&'static str),
    #[error("transaction already committed or rolled back")]
    TransactionClosed,
    #[error("operation cancelled")]
    Cancelled,
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

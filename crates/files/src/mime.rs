use crate::constants::{DEFAULT_MIME_TYPE, SNIFF_LENGTH};
use crate::FilesError;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Picks the media type to record for the blob at `path`.
///
/// A specific type declared by the client wins. Otherwise the leading bytes
/// are sniffed (best-effort, not authoritative) and the generic binary type is
/// the fallback.
///
/// # Errors
///
/// Returns [`FilesError::Io`] if the blob cannot be read.
pub async fn sniff_mime(path: &Path, declared: Option<&str>) -> Result<String, FilesError> {
    if let Some(declared) = declared.map(str::trim) {
        if !declared.is_empty() && declared != DEFAULT_MIME_TYPE {
            return Ok(declared.to_owned());
        }
    }

    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LENGTH);
    file.take(SNIFF_LENGTH as u64).read_to_end(&mut head).await?;

    Ok(infer::get(&head)
        .map(|kind| kind.mime_type().to_owned())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[tokio::test]
    async fn test_declared_type_wins() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let mime = sniff_mime(&path, Some("text/plain")).await.unwrap();
        assert_eq!(mime, "text/plain");
    }

    #[tokio::test]
    async fn test_sniffs_when_generic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let mime = sniff_mime(&path, Some(DEFAULT_MIME_TYPE)).await.unwrap();
        assert_eq!(mime, "image/png");
    }

    #[tokio::test]
    async fn test_falls_back_to_binary() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x");
        std::fs::write(&path, b"plain words").unwrap();

        let mime = sniff_mime(&path, None).await.unwrap();
        assert_eq!(mime, DEFAULT_MIME_TYPE);
    }
}

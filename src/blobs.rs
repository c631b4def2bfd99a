//! Flat on-disk blob store. Blobs are addressed by a server-generated
//! `storage_id` path relative to the configured data root.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::AppError;

fn blob_path(data_root: &Path, storage_id: &str) -> PathBuf {
    data_root.join(storage_id)
}

pub async fn store_blob(
    data_root: &Path,
    storage_id: &str,
    bytes: &[u8],
) -> Result<(), AppError> {
    let path = blob_path(data_root, storage_id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(AppError::Io)?;
    }
    fs::write(&path, bytes).await.map_err(AppError::Io)
}

/// Delete-by-reference. A blob that is already gone is not an error; the
/// row referencing it is being removed either way.
pub async fn delete_blob(data_root: &Path, storage_id: &str) -> Result<(), AppError> {
    let path = blob_path(data_root, storage_id);
    match fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(storage_id, "blob already missing during delete");
            Ok(())
        }
        Err(err) => Err(AppError::Io(err)),
    }
}

/// Restricts an uploaded filename to a safe single path segment.
pub fn sanitize_asset_name(name: &str) -> String {
    let fallback = "asset.bin";
    let file_name = Path::new(name)
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or(fallback);
    let sanitized: String = file_name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        fallback.into()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_simple_names() {
        assert_eq!(sanitize_asset_name("logo.png"), "logo.png");
        assert_eq!(sanitize_asset_name("a-b_c.2.txt"), "a-b_c.2.txt");
    }

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_asset_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_asset_name("weird name!.png"), "weird_name_.png");
        assert_eq!(sanitize_asset_name(""), "asset.bin");
    }

    #[tokio::test]
    async fn store_and_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        store_blob(dir.path(), "p1/logo.png", b"bytes").await.unwrap();
        assert!(dir.path().join("p1/logo.png").exists());

        delete_blob(dir.path(), "p1/logo.png").await.unwrap();
        assert!(!dir.path().join("p1/logo.png").exists());

        // second delete is a no-op
        delete_blob(dir.path(), "p1/logo.png").await.unwrap();
    }
}

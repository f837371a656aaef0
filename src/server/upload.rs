use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::ApiError;

pub const ALLOWED_EXTENSIONS: [&str; 4] = [".mp4", ".avi", ".mov", ".mkv"];

/// Lowercased extension of `file_name` with its leading dot, if it is an accepted video type.
pub fn allowed_extension(file_name: &str) -> Result<String, ApiError> {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(ApiError::UnsupportedFileType(ext))
    }
}

/// An uploaded video on disk. The file is removed when the guard drops.
#[derive(Debug)]
pub struct TempUpload {
    pub path: PathBuf,
    pub original_name: String,
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("Cleaned up uploaded file: {:?}", self.path),
            Err(e) => error!("Error removing uploaded file {:?}: {}", self.path, e),
        }
    }
}

/// Streams a multipart file field to `<upload_dir>/<uuid><ext>`.
///
/// The extension is checked before anything touches the disk.
pub async fn receive_upload(mut field: Field<'_>, upload_dir: &Path) -> Result<TempUpload, ApiError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or("unknown").to_string();

    let ext = allowed_extension(&original_name).inspect_err(|_| {
        warn!("Unsupported file type rejected: {} (type: {})", original_name, content_type);
    })?;

    let upload = TempUpload {
        path: upload_dir.join(format!("{}{}", Uuid::new_v4(), ext)),
        original_name,
    };
    info!(
        "Receiving file: {} ({}), saving to: {:?}",
        upload.original_name, content_type, upload.path
    );

    let mut file = tokio::fs::File::create(&upload.path).await.map_err(|e| {
        error!("Failed to create upload file {:?}: {}", upload.path, e);
        ApiError::Internal
    })?;

    let mut written = 0usize;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len();
        file.write_all(&chunk).await.map_err(|e| {
            error!("Failed to write upload file {:?}: {}", upload.path, e);
            ApiError::Internal
        })?;
    }
    file.flush().await.map_err(|e| {
        error!("Failed to flush upload file {:?}: {}", upload.path, e);
        ApiError::Internal
    })?;

    info!("Received {} bytes into {:?}", written, upload.path);
    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        assert_eq!(allowed_extension("clip.mp4").unwrap(), ".mp4");
        assert_eq!(allowed_extension("HOLIDAY.MOV").unwrap(), ".mov");
        assert_eq!(allowed_extension("a.b.mkv").unwrap(), ".mkv");
        assert_eq!(allowed_extension("old.avi").unwrap(), ".avi");
    }

    #[test]
    fn test_rejected_extensions() {
        for name in ["notes.txt", "clip.webm", "noextension", ""] {
            assert!(matches!(
                allowed_extension(name),
                Err(ApiError::UnsupportedFileType(_))
            ));
        }
        let err = allowed_extension("notes.txt").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported file type (.txt). Please upload MP4, AVI, MOV, or MKV."
        );
    }

    #[test]
    fn test_temp_upload_removes_file_on_drop() {
        let path = std::env::temp_dir().join(format!("{}.mp4", Uuid::new_v4()));
        std::fs::write(&path, b"bytes").unwrap();

        let upload = TempUpload {
            path: path.clone(),
            original_name: "clip.mp4".into(),
        };
        assert!(path.exists());
        drop(upload);
        assert!(!path.exists());
    }
}

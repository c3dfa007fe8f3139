use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::AppError;

/// 10 MB limit for attached images
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Writes uploaded images under a fixed directory with collision-free names.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store `bytes` as `{uuid}.{original_name}` and return that name once the
    /// file is fully written. Never overwrites an existing file.
    pub async fn store(&self, bytes: &[u8], original_name: &str) -> Result<String, AppError> {
        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(AppError::invalid("file", "File is too large"));
        }

        let original = sanitize(original_name);
        if original.is_empty() {
            return Err(AppError::invalid("file", "File name is missing"));
        }

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            tracing::error!("Failed to create upload directory {}: {}", self.root.display(), e);
            AppError::from(e)
        })?;

        let stored_name = format!("{}.{}", Uuid::new_v4(), original);
        write_new(&self.root.join(&stored_name), bytes).await?;

        tracing::debug!(file = %stored_name, size = bytes.len(), "Upload stored");
        Ok(stored_name)
    }

    /// Remove a stored upload that ended up unreferenced. Missing files are
    /// not an error.
    pub async fn discard(&self, stored_name: &str) {
        let path = self.root.join(sanitize(stored_name));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(file = %stored_name, "Upload discarded"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to discard {}: {}", path.display(), e),
        }
    }
}

/// Create `path` and write `bytes` into it. Fails if `path` already exists;
/// a partial file is removed on write failure.
async fn write_new(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    if let Err(e) = write_fully(&mut file, bytes).await {
        tracing::error!("Failed to write {}: {}", path.display(), e);
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(e.into());
    }

    Ok(())
}

async fn write_fully(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Keep only the final path component and a conservative character set.
fn sanitize(name: &str) -> String {
    let base = Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

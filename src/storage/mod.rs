//! Payment receipt storage and the job that expires old receipts.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub mod cleanup;

pub use cleanup::{cleanup_old_receipts, CleanupPolicy, CleanupReport};

pub const RECEIPTS_BUCKET: &str = "payment-receipts";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("file is empty")]
    Empty,

    #[error("file is larger than {max} bytes")]
    TooLarge { max: usize },

    #[error("invalid file name `{0}`")]
    InvalidName(String),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

pub trait ImageStore: Send + Sync {
    /// Stores `bytes` and returns the public URL.
    fn upload(&self, bucket: &str, file_name: &str, bytes: Vec<u8>) -> impl Future<Output = Result<String, UploadError>> + Send;

    /// A page of the bucket, oldest first.
    fn list(&self, bucket: &str, offset: usize, limit: usize) -> impl Future<Output = Result<Vec<StoredFile>, UploadError>> + Send;

    fn remove(&self, bucket: &str, names: &[String]) -> impl Future<Output = Result<(), UploadError>> + Send;
}

/// Image store on the local filesystem: `<root>/<bucket>/<file>`, served under `public_url`.
#[derive(Clone, Debug)]
pub struct LocalImageStore {
    root: PathBuf,
    public_url: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self { root: root.into(), public_url: public_url.into().trim_end_matches('/').to_string() }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, UploadError> {
        if !is_plain_name(bucket) {
            return Err(UploadError::InvalidName(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// `<uuid>.<ext>`, keeping only a short alphanumeric extension from the original name.
fn stored_name(file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());
    match ext {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
        None => Uuid::new_v4().to_string(),
    }
}

impl ImageStore for LocalImageStore {
    async fn upload(&self, bucket: &str, file_name: &str, bytes: Vec<u8>) -> Result<String, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge { max: MAX_UPLOAD_BYTES });
        }
        let dir = self.bucket_dir(bucket)?;
        tokio::fs::create_dir_all(&dir).await?;
        let name = stored_name(file_name);
        tokio::fs::write(dir.join(&name), &bytes).await?;
        tracing::debug!(bucket, file = %name, size = bytes.len(), "image stored");
        Ok(format!("{}/{bucket}/{name}", self.public_url))
    }

    async fn list(&self, bucket: &str, offset: usize, limit: usize) -> Result<Vec<StoredFile>, UploadError> {
        let dir = self.bucket_dir(bucket)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            files.push(StoredFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                created_at: DateTime::<Utc>::from(meta.modified()?),
            });
        }
        files.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(files.into_iter().skip(offset).take(limit).collect())
    }

    async fn remove(&self, bucket: &str, names: &[String]) -> Result<(), UploadError> {
        let dir = self.bucket_dir(bucket)?;
        for name in names {
            if !is_plain_name(name) {
                return Err(UploadError::InvalidName(name.clone()));
            }
            match tokio::fs::remove_file(dir.join(name)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path(), "https://cdn.example/");
        let url = store.upload(RECEIPTS_BUCKET, "GCash Receipt.PNG", vec![1, 2, 3]).await.unwrap();
        assert!(url.starts_with("https://cdn.example/payment-receipts/"));
        assert!(url.ends_with(".png"));

        let files = store.list(RECEIPTS_BUCKET, 0, 10).await.unwrap();
        assert_eq!(files.len(), 1);
        store.remove(RECEIPTS_BUCKET, &[files[0].name.clone()]).await.unwrap();
        assert!(store.list(RECEIPTS_BUCKET, 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path(), "http://localhost");
        assert!(matches!(store.upload(RECEIPTS_BUCKET, "a.png", vec![]).await, Err(UploadError::Empty)));
        assert!(matches!(store.upload("../etc", "a.png", vec![1]).await, Err(UploadError::InvalidName(_))));
        assert!(matches!(
            store.remove(RECEIPTS_BUCKET, &["../secret".to_string()]).await,
            Err(UploadError::InvalidName(_))
        ));
        assert!(store.list("missing-bucket", 0, 10).await.unwrap().is_empty());
    }
}

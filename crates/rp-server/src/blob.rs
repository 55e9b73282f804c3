//! Blob storage: resolving an asset's storage key to its bytes.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use rp_core::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};

use crate::range::ByteWindow;

/// Reader type handed out by a [`BlobStore`].
pub type BlobReader = Box<dyn BlobSource>;

/// Anything we can seek within and read from.
pub trait BlobSource: AsyncRead + tokio::io::AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + tokio::io::AsyncSeek + Send + Unpin> BlobSource for T {}

/// An opened blob. The reader has its own offset, so every streaming
/// session gets an independent handle.
pub struct BlobHandle {
    pub len: u64,
    pub reader: BlobReader,
}

impl std::fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobHandle").field("len", &self.len).finish()
    }
}

impl BlobHandle {
    /// Position at `window.start` and cap reads at `window.len()` bytes.
    pub async fn into_window_reader(
        mut self,
        window: ByteWindow,
    ) -> Result<impl AsyncRead + Send + Unpin> {
        if window.start > 0 {
            self.reader
                .seek(std::io::SeekFrom::Start(window.start))
                .await?;
        }
        Ok(self.reader.take(window.len()))
    }
}

/// Byte storage keyed by an asset's `storage_key`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open a blob for reading.
    ///
    /// A key that does not resolve to stored bytes is
    /// [`Error::StorageIntegrity`]: the caller already holds an asset
    /// record pointing at it.
    async fn open(&self, key: &str) -> Result<BlobHandle>;
}

/// Blob store over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a storage key to a path under `root`.
    pub fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('\\') {
            return Err(Error::Validation(format!("invalid storage key: {key:?}")));
        }
        let rel = Path::new(key);
        let clean = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !clean {
            return Err(Error::Validation(format!("invalid storage key: {key:?}")));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn open(&self, key: &str) -> Result<BlobHandle> {
        let path = self.resolve(key)?;

        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::StorageIntegrity(format!(
                    "blob {key} missing at {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(Error::StorageIntegrity(format!(
                "blob {key} is not a regular file"
            )));
        }

        Ok(BlobHandle {
            len: meta.len(),
            reader: Box::new(file),
        })
    }
}

//! Filesystem content store.
//!
//! A key `SHOP1/1700000000000000000-flyer.pdf` lives at
//! `{root}/SHOP1/1700000000000000000-flyer.pdf`. Keys are validated on parse,
//! so joining one onto the root cannot escape it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use printdrop_core::{StorageKey, StoreCode};

use super::{ContentStore, FileMetadata, StorageError, next_key_timestamp};

/// Content store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Use `root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Where `key` lives on disk.
    #[must_use]
    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.namespace()).join(key.file_name())
    }

    async fn write_new(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;

        let written = async {
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            remove_partial(path).await;
            return Err(e);
        }
        Ok(())
    }
}

/// Best-effort removal of a file left behind by a failed write. Returns
/// whether the path is gone.
async fn remove_partial(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove partially written file"
            );
            false
        }
    }
}

#[async_trait]
impl ContentStore for FilesystemStore {
    fn backend(&self) -> &'static str {
        "filesystem"
    }

    async fn put(
        &self,
        namespace: &StoreCode,
        display_name: &str,
        bytes: Bytes,
        _metadata: &FileMetadata,
    ) -> Result<StorageKey, StorageError> {
        let key = StorageKey::generate(namespace, display_name, next_key_timestamp());
        let path = self.path_for(&key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        match self.write_new(&path, &bytes).await {
            Ok(()) => Ok(key),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StorageError::KeyCollision(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

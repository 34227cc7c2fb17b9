use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::backend::{Backend, StoreResult};
use crate::error::StoreError;

const EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// File-per-key backend
///
/// Layout: `<root>/<collection>/<key>.json`. Writes go to a temp file that is
/// synced and renamed over the target, so a reader never sees a torn document.
pub struct FileBackend {
    root: PathBuf,
    /// Serialises existence checks with the writes that depend on them
    write_lock: Mutex<()>,
}

impl FileBackend {
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        info!("File store opened at {}", root.display());

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn key_path(&self, collection: &str, key: &str) -> StoreResult<PathBuf> {
        if !is_valid_key(collection) || !is_valid_key(key) {
            return Err(StoreError::Backend(format!(
                "invalid key `{}/{}`",
                collection, key
            )));
        }

        Ok(self
            .collection_dir(collection)
            .join(format!("{}.{}", key, EXTENSION)))
    }

    async fn write_atomic(&self, path: &Path, value: &[u8]) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp = path.as_os_str().to_owned();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        let mut file = fs::File::create(&temp).await?;
        file.write_all(value).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp, path).await?;

        debug!("Wrote {} ({} bytes)", path.display(), value.len());
        Ok(())
    }
}

/// Keys become file names, so only a conservative alphabet is accepted
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait::async_trait]
impl Backend for FileBackend {
    async fn insert(&self, collection: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let path = self.key_path(collection, key)?;
        let _guard = self.write_lock.lock().await;

        if fs::try_exists(&path).await? {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }

        self.write_atomic(&path, &value).await
    }

    async fn replace(&self, collection: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let path = match self.key_path(collection, key) {
            Ok(path) => path,
            Err(_) => return Err(StoreError::not_found(collection, key)),
        };
        let _guard = self.write_lock.lock().await;

        if !fs::try_exists(&path).await? {
            return Err(StoreError::not_found(collection, key));
        }

        self.write_atomic(&path, &value).await
    }

    async fn put(&self, collection: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let path = self.key_path(collection, key)?;
        let _guard = self.write_lock.lock().await;
        self.write_atomic(&path, &value).await
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let Ok(path) = self.key_path(collection, key) else {
            return Ok(None);
        };

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let dir = self.collection_dir(collection);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut documents = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }

            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            match fs::read(&path).await {
                Ok(bytes) => documents.push((key.to_string(), bytes)),
                // Deleted between read_dir and read
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    return Err(e.into());
                }
            }
        }

        documents.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(documents)
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool> {
        let Ok(path) = self.key_path(collection, key) else {
            return Ok(false);
        };
        let _guard = self.write_lock.lock().await;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

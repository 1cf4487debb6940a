//! Local directory file store.
//!
//! Layout is `<root>/<identity>/<name>`. Writes land in `<root>/.staging/`
//! first and are renamed into place after an fsync, so a reader sees either
//! the previous content or the new content, never a partial file. Concurrent
//! writers to the same name are last-writer-wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use filedrop_common::backend::{FileStore, StoreError};
use filedrop_common::naming;
use filedrop_common::Identity;

/// Identities never start with '.', so this cannot collide with one.
const STAGING_DIR: &str = ".staging";

pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root and staging area.
    pub async fn init(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.root.join(STAGING_DIR)).await?;
        Ok(())
    }

    pub fn identity_dir(&self, identity: &Identity) -> PathBuf {
        self.root.join(identity.as_str())
    }

    /// Compose the path of `name` for `identity`. No existence check.
    pub fn resolve_path(&self, identity: &Identity, name: &str) -> PathBuf {
        self.identity_dir(identity).join(name)
    }

    /// Create the identity's directory if it does not exist yet. Idempotent.
    pub async fn ensure_identity_dir(&self, identity: &Identity) -> Result<(), StoreError> {
        let dir = self.identity_dir(identity);
        if !tokio::fs::try_exists(&dir).await? {
            tokio::fs::create_dir_all(&dir).await?;
            info!(identity = %identity, dir = %dir.display(), "Created identity directory");
        }
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        self.root
            .join(STAGING_DIR)
            .join(format!("{}.tmp", uuid::Uuid::new_v4()))
    }
}

#[async_trait]
impl FileStore for DirectoryStore {
    async fn put(&self, identity: &Identity, name: &str, data: Bytes) -> Result<(), StoreError> {
        naming::validate(name).map_err(|_| StoreError::InvalidName(name.to_string()))?;
        self.ensure_identity_dir(identity).await?;

        let dest = self.resolve_path(identity, name);
        let tmp_path = self.staging_path();
        if let Some(parent) = tmp_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let result = write_and_rename(&tmp_path, &dest, &data).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
        result?;

        info!(identity = %identity, file = %name, size = data.len(), "Stored file");
        Ok(())
    }

    async fn list(&self, identity: &Identity) -> Result<Vec<String>, StoreError> {
        let dir = self.identity_dir(identity);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(identity.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();

        debug!(identity = %identity, count = names.len(), "Listed files");
        Ok(names)
    }

    async fn get(&self, identity: &Identity, name: &str) -> Result<Bytes, StoreError> {
        naming::validate(name).map_err(|_| StoreError::InvalidName(name.to_string()))?;
        let path = self.resolve_path(identity, name);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                debug!(identity = %identity, file = %name, size = data.len(), "Read file");
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_and_rename(tmp_path: &Path, dest: &Path, data: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(tmp_path, data).await?;

    let file = tokio::fs::OpenOptions::new().write(true).open(tmp_path).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(tmp_path, dest).await
}

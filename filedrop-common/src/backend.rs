use bytes::Bytes;

use crate::identity::Identity;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid filename: {0:?}")]
    InvalidName(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait implemented by storage backends holding uploaded files.
///
/// Files are addressed by (identity, stored name). Callers are expected to
/// pass names already derived through [`crate::naming`]; implementations
/// still refuse names that would escape the identity's namespace.
#[async_trait::async_trait]
pub trait FileStore: Send + Sync {
    /// Store `data` under `name`, replacing any existing file of that name.
    async fn put(&self, identity: &Identity, name: &str, data: Bytes) -> Result<(), StoreError>;

    /// List stored names for `identity`, sorted.
    ///
    /// Returns [`StoreError::NotFound`] if the identity has never stored
    /// anything, which is distinct from an empty list.
    async fn list(&self, identity: &Identity) -> Result<Vec<String>, StoreError>;

    /// Fetch the full content of `name`.
    async fn get(&self, identity: &Identity, name: &str) -> Result<Bytes, StoreError>;
}

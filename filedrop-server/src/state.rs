use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use filedrop_common::FileStore;

use crate::auth::identity::IdentityResolver;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn FileStore>,
    pub identity: Arc<dyn IdentityResolver>,
    /// Root directory reported by the health check
    pub storage_root: PathBuf,
    /// Upper bound on a single upload request body
    pub max_upload_bytes: usize,
    pub started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn FileStore>,
        identity: Arc<dyn IdentityResolver>,
        storage_root: PathBuf,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            store,
            identity,
            storage_root,
            max_upload_bytes,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }
}

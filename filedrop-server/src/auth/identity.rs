use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use filedrop_common::Identity;

use crate::config::{IdentityConfig, IdentityMode};
use crate::error::ApiError;
use crate::state::AppState;

/// Derives the caller identity from request context.
///
/// Returning `None` rejects the request before any storage access.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Attributes every request to one fixed identity. Not authentication.
pub struct StaticIdentity {
    identity: Identity,
}

impl StaticIdentity {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

#[async_trait::async_trait]
impl IdentityResolver for StaticIdentity {
    async fn resolve(&self, _headers: &HeaderMap) -> Option<Identity> {
        Some(self.identity.clone())
    }
}

/// Trusts an identity header injected by an upstream proxy.
pub struct HeaderIdentity {
    header: HeaderName,
}

impl HeaderIdentity {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

#[async_trait::async_trait]
impl IdentityResolver for HeaderIdentity {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let raw = headers.get(&self.header)?.to_str().ok()?;
        Identity::parse(raw.trim()).ok()
    }
}

pub fn from_config(config: &IdentityConfig) -> anyhow::Result<Arc<dyn IdentityResolver>> {
    match config.mode {
        IdentityMode::Static => {
            let identity = Identity::parse(&config.static_id)?;
            Ok(Arc::new(StaticIdentity::new(identity)))
        }
        IdentityMode::Header => {
            let header = HeaderName::try_from(config.header.as_str())?;
            Ok(Arc::new(HeaderIdentity::new(header)))
        }
    }
}

/// Axum middleware that resolves the caller identity and stores it in the
/// request extensions for handlers.
pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let resolved = state.identity.resolve(req.headers()).await;
    match resolved {
        Some(identity) => {
            debug!(identity = %identity, path = %req.uri().path(), "Resolved identity");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        None => {
            warn!(path = %req.uri().path(), "Request without a resolvable identity");
            ApiError::MissingIdentity.into_response()
        }
    }
}

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::http::HeaderName;
use serde::Deserialize;

use filedrop_common::Identity;

const DEFAULT_BIND: &str = "0.0.0.0:3010";
const DEFAULT_STORAGE_ROOT: &str = "./uploads";
const DEFAULT_WEB_DIR: &str = "web";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_STATIC_IDENTITY: &str = "125";
const DEFAULT_IDENTITY_HEADER: &str = "x-filedrop-user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    /// Every request is attributed to `static_id`.
    Static,
    /// Identity is read from a header set by an upstream proxy.
    Header,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub mode: IdentityMode,
    pub static_id: String,
    pub header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mode: IdentityMode::Static,
            static_id: DEFAULT_STATIC_IDENTITY.to_string(),
            header: DEFAULT_IDENTITY_HEADER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub storage_root: PathBuf,
    pub web_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub cors_permissive: bool,
    pub identity: IdentityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            web_dir: PathBuf::from(DEFAULT_WEB_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_permissive: true,
            identity: IdentityConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from an optional TOML file, then apply `FILEDROP_*` environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
                Self::from_toml(&content)
                    .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn apply_env<F>(&mut self, var: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("FILEDROP_BIND") {
            self.bind = v;
        }
        if let Some(v) = var("FILEDROP_STORAGE_ROOT") {
            self.storage_root = PathBuf::from(v);
        }
        if let Some(v) = var("FILEDROP_WEB_DIR") {
            self.web_dir = PathBuf::from(v);
        }
        if let Some(v) = var("FILEDROP_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = v
                .parse()
                .map_err(|_| anyhow::anyhow!("FILEDROP_MAX_UPLOAD_BYTES is not a number: {}", v))?;
        }
        if let Some(v) = var("FILEDROP_CORS_PERMISSIVE") {
            self.cors_permissive = parse_bool(&v)
                .ok_or_else(|| anyhow::anyhow!("FILEDROP_CORS_PERMISSIVE is not a boolean: {}", v))?;
        }
        if let Some(v) = var("FILEDROP_IDENTITY_MODE") {
            self.identity.mode = match v.to_ascii_lowercase().as_str() {
                "static" => IdentityMode::Static,
                "header" => IdentityMode::Header,
                _ => anyhow::bail!("FILEDROP_IDENTITY_MODE must be \"static\" or \"header\": {}", v),
            };
        }
        if let Some(v) = var("FILEDROP_STATIC_IDENTITY") {
            self.identity.static_id = v;
        }
        if let Some(v) = var("FILEDROP_IDENTITY_HEADER") {
            self.identity.header = v;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.bind_addr()?;
        if self.storage_root.as_os_str().is_empty() {
            anyhow::bail!("storage_root must not be empty");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than zero");
        }
        match self.identity.mode {
            IdentityMode::Static => {
                Identity::parse(&self.identity.static_id)
                    .map_err(|e| anyhow::anyhow!("identity.static_id: {}", e))?;
            }
            IdentityMode::Header => {
                HeaderName::try_from(self.identity.header.as_str())
                    .map_err(|_| anyhow::anyhow!("identity.header is not a valid header name: {}", self.identity.header))?;
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", self.bind, e))
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

use std::fmt;

/// Opaque key that namespaces a caller's stored files.
///
/// An identity doubles as a directory name under the storage root, so it
/// must be a single, non-hidden path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("identity must not be empty")]
    Empty,
    #[error("identity is not a valid path segment: {0:?}")]
    InvalidSegment(String),
}

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        if raw.is_empty() {
            return Err(IdentityError::Empty);
        }
        if raw.starts_with('.') || raw.contains(['/', '\\', '\0']) {
            return Err(IdentityError::InvalidSegment(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

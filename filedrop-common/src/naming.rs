//! Stored-filename derivation.
//!
//! A stored name is the caller's desired name (or, when that is blank, the
//! uploaded file's original name) with every space replaced by a hyphen.
//! Names that would escape the identity directory are rejected rather than
//! rewritten.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("no filename supplied")]
    Missing,
    #[error("invalid filename: {0:?}")]
    Invalid(String),
}

/// Replace each space with a hyphen. No other transformation is applied.
pub fn sanitize(name: &str) -> String {
    name.replace(' ', "-")
}

/// Pick the name an upload is stored under.
///
/// `desired` wins when it is present and non-empty.
pub fn stored_name(desired: Option<&str>, original: Option<&str>) -> Result<String, NameError> {
    let chosen = desired
        .filter(|d| !d.is_empty())
        .or(original.filter(|o| !o.is_empty()))
        .ok_or(NameError::Missing)?;
    let name = sanitize(chosen);
    validate(&name)?;
    Ok(name)
}

/// Check that `name` resolves to a direct child of its identity directory.
pub fn validate(name: &str) -> Result<(), NameError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(NameError::Invalid(name.to_string()));
    }
    Ok(())
}

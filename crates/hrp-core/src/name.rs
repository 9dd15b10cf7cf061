//! Chart name validation
//!
//! Chart names arrive straight from request paths and multipart filenames
//! and end up joined onto storage keys and filesystem paths. A name is a
//! single flat path segment; anything that could escape the repository root
//! is rejected before it gets that far.

use std::fmt;

use crate::error::{CoreError, Result};

/// Filename of the repository index
pub const INDEX_FILENAME: &str = "index.yaml";

/// A validated, path-traversal-safe chart filename
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartName(String);

impl ChartName {
    /// Validate a name for reading
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |reason: &str| CoreError::InvalidChartName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name == "." || name == ".." {
            return Err(invalid("name is a relative path segment"));
        }
        if name.starts_with('.') {
            return Err(invalid("hidden files are not served"));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(invalid("name must not contain path separators"));
        }
        if name.chars().any(|c| c == '\0' || c.is_control()) {
            return Err(invalid("name contains control characters"));
        }

        Ok(Self(name.to_string()))
    }

    /// Validate a name for writing; the index filename is reserved
    pub fn parse_for_write(name: &str) -> Result<Self> {
        let parsed = Self::parse(name)?;
        if parsed.is_index() {
            return Err(CoreError::InvalidChartName {
                name: name.to_string(),
                reason: format!("'{}' is reserved for the repository index", INDEX_FILENAME),
            });
        }
        Ok(parsed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the repository index filename
    pub fn is_index(&self) -> bool {
        self.0 == INDEX_FILENAME
    }
}

impl AsRef<str> for ChartName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

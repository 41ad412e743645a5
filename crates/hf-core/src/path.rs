//! Signal paths and the target/actual key spaces.

use core::fmt;

use crate::error::{CoreError, CoreResult};

/// Dot-separated signal path, e.g. `Vehicle.Cabin.Door.Row1.Left.IsLocked`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalPath(String);

impl SignalPath {
    /// Create a path without validation.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Create a path, rejecting empty segments and whitespace.
    pub fn parse(path: &str) -> CoreResult<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidPath {
                what: "path is empty",
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidPath {
                what: "path contains whitespace",
            });
        }
        if trimmed.split('.').any(str::is_empty) {
            return Err(CoreError::InvalidPath {
                what: "path contains an empty segment",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the last commanded value for this path.
    pub fn target(&self) -> SignalKey {
        SignalKey::Target(self.clone())
    }

    /// Key of the last published value for this path.
    pub fn actual(&self) -> SignalKey {
        SignalKey::Actual(self.clone())
    }
}

impl fmt::Display for SignalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SignalPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl From<&str> for SignalPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl AsRef<str> for SignalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A signal path qualified by the key space it lives in.
///
/// A served actuator surfaces under one external path, but its commanded
/// value and its published value are distinct pieces of state. Keeping them
/// in separate variants means an echoed actual value can never be read back
/// as a fresh command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKey {
    /// Last commanded value of a served actuator.
    Target(SignalPath),
    /// Last published or observed value.
    Actual(SignalPath),
}

impl SignalKey {
    pub fn path(&self) -> &SignalPath {
        match self {
            Self::Target(path) | Self::Actual(path) => path,
        }
    }

    pub fn is_target(&self) -> bool {
        matches!(self, Self::Target(_))
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(path) => write!(f, "target({path})"),
            Self::Actual(path) => write!(f, "actual({path})"),
        }
    }
}

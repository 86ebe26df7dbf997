//! Domain types for compose-tabs
//!
//! Service identifiers are never declared up front; they are discovered
//! from the prefixes of the lines the log command emits.

use std::fmt;

/// Identifier of a log-producing service, e.g. `web-1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(String);

impl ServiceId {
    /// Build an identifier, rejecting anything outside `[A-Za-z0-9-]+`
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if Self::is_valid(&id) { Some(Self(id)) } else { None }
    }

    /// Whether `s` is a non-empty run of ASCII letters, digits and hyphens
    pub fn is_valid(s: &str) -> bool {
        !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One framed record: which service said what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub service: ServiceId,
    pub message: String,
}

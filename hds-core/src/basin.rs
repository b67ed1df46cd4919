use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

/// Identifier of a gauged catchment, unique within its region.
///
/// Ids are kept as strings: several providers use leading zeros
/// (`"03001"`) or alphanumeric codes (`"A105003001"`) that a numeric type
/// would lose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasinId(String);

impl BasinId {
    pub fn new(id: impl Into<String>) -> Self {
        BasinId(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Left-pad a numeric id with zeros to `width` characters.
    pub fn zero_padded(&self, width: usize) -> BasinId {
        BasinId(format!("{:0>width$}", self.0, width = width))
    }
}

impl fmt::Display for BasinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BasinId {
    fn from(s: &str) -> Self {
        BasinId::new(s)
    }
}

impl From<String> for BasinId {
    fn from(s: String) -> Self {
        BasinId::new(s)
    }
}

impl Borrow<str> for BasinId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BasinId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

//! Snapshot document: the canonical JSON record of installed extensions.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::Result;

/// File name of the snapshot inside the history repository.
pub const SNAPSHOT_FILE: &str = "extensions.json";

/// An extension identifier such as `ms-python.python`.
///
/// Stored exactly as the editor reports it. Comparisons that must ignore case go
/// through [`ExtensionId::key`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionId(String);

impl ExtensionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased form used for case-insensitive membership tests.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn eq_ignore_case(&self, other: &ExtensionId) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExtensionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ExtensionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Parse line-oriented tool output (one identifier per line) into ids.
/// Blank lines and surrounding whitespace are dropped.
pub fn parse_id_lines(output: &str) -> Vec<ExtensionId> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ExtensionId::from)
        .collect()
}

/// The persisted `{ total, extensions }` document.
///
/// `extensions` is always sorted ascending (byte order of the stored strings)
/// and free of duplicates, and `total` always equals its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotDocument {
    total: usize,
    extensions: Vec<ExtensionId>,
}

impl SnapshotDocument {
    /// Build a normalized document from any list of identifiers.
    pub fn from_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ExtensionId>,
    {
        let set: BTreeSet<ExtensionId> = ids.into_iter().map(Into::into).collect();
        let extensions: Vec<ExtensionId> = set.into_iter().collect();
        Self {
            total: extensions.len(),
            extensions,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn extensions(&self) -> &[ExtensionId] {
        &self.extensions
    }

    /// Pretty-printed JSON with stable key order. Identical input always
    /// yields byte-identical output.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for SnapshotDocument {
    fn default() -> Self {
        Self::from_ids(Vec::<ExtensionId>::new())
    }
}

/// Only `extensions` is read. `total` is recomputed, and older fields such
/// as `timestamp` are ignored.
#[derive(Deserialize)]
struct RawSnapshotDocument {
    #[serde(default)]
    extensions: Vec<ExtensionId>,
}

impl<'de> Deserialize<'de> for SnapshotDocument {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawSnapshotDocument::deserialize(deserializer)?;
        Ok(Self::from_ids(raw.extensions))
    }
}

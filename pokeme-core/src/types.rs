//! Domain types shared by the coordination, clone and daemon crates.
//!
//! All types are serializable/deserializable via serde + serde_yaml.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommitIdError;

// ---------------------------------------------------------------------------
// CommitId
// ---------------------------------------------------------------------------

/// Shortest abbreviated object name git accepts.
pub const MIN_COMMIT_ID_LEN: usize = 4;

/// Full SHA-256 object name length.
pub const MAX_COMMIT_ID_LEN: usize = 64;

/// A git commit identifier (abbreviated or full, SHA-1 or SHA-256).
///
/// Only lowercase or uppercase hex digits are accepted, which also rules out
/// anything git could mistake for an option or a refspec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    pub fn parse(raw: &str) -> Result<Self, CommitIdError> {
        let trimmed = raw.trim();
        if trimmed.len() < MIN_COMMIT_ID_LEN || trimmed.len() > MAX_COMMIT_ID_LEN {
            return Err(CommitIdError::Length {
                len: trimmed.len(),
            });
        }
        if let Some(bad) = trimmed.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(CommitIdError::NotHex { found: bad });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Decode a raw register payload.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, CommitIdError> {
        let text = std::str::from_utf8(raw).map_err(|_| CommitIdError::NotUtf8)?;
        Self::parse(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First seven characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(7)]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CommitId {
    type Err = CommitIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CommitId {
    type Error = CommitIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Template substitution input: secret name → value.
///
/// `Debug` never prints values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secrets(BTreeMap<String, String>);

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same keys, every value replaced by `mask`.
    pub fn masked(&self, mask: &str) -> Self {
        Self(self.0.keys().map(|k| (k.clone(), mask.to_string())).collect())
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Secrets {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Whether `key` can be referenced as `{{key}}` in a template.
pub fn is_template_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

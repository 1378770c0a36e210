//! Dot-delimited addresses into the config tree

use std::fmt;
use std::str::FromStr;

use crate::constants::path::SEPARATOR;
use crate::error::StoreError;

/// A validated, non-root config path such as `lights.key.intensity`.
///
/// Always has at least one segment and no segment is empty, so every path
/// names a slot that can be assigned into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    segments: Vec<String>,
}

impl ConfigPath {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        if raw.is_empty() {
            return Err(StoreError::InvalidPath {
                path: raw.to_string(),
                reason: "the root cannot be assigned",
            });
        }
        let segments: Vec<String> = raw.split(SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(StoreError::InvalidPath {
                path: raw.to_string(),
                reason: "empty segment",
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Everything but the last segment, and the last segment
    pub fn split_last(&self) -> (&[String], &str) {
        match self.segments.split_last() {
            Some((last, parents)) => (parents, last),
            // parse() never builds an empty path
            None => (&[], ""),
        }
    }

    /// Path made of the first `len` segments, used in error messages
    pub(crate) fn prefix(&self, len: usize) -> String {
        self.segments[..len].join(&SEPARATOR.to_string())
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix(self.segments.len()))
    }
}

impl FromStr for ConfigPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ConfigPath {
    type Error = StoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&String> for ConfigPath {
    type Error = StoreError;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&ConfigPath> for ConfigPath {
    type Error = StoreError;

    fn try_from(value: &ConfigPath) -> Result<Self, Self::Error> {
        Ok(value.clone())
    }
}

//! Remote naming: the run's bucket and the per-file object names
//!
//! Local files are never renamed or deleted, so repeated drains of the same
//! file name are told apart by a sequence number: `name-0`, `name-1`, ...

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::error::{GuardError, Result};

/// Name of the remote bucket owned by one run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketName(String);

impl BucketName {
    /// Validate a bucket name against the S3 naming rules we rely on:
    /// 3 to 63 characters of lowercase letters, digits, `-` and `.`,
    /// starting and ending with a letter or digit.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid_len = (3..=63).contains(&name.len());
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
        let valid_ends = name
            .chars()
            .next()
            .zip(name.chars().last())
            .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

        if valid_len && valid_chars && valid_ends {
            Ok(Self(name))
        } else {
            Err(GuardError::config(format!("invalid bucket name '{}'", name)))
        }
    }

    /// Bucket name for a run started now: `YYYYmmddHHMMSS-<suffix>`
    pub fn timestamped(suffix: &str) -> Result<Self> {
        Self::at(Local::now(), suffix)
    }

    /// Bucket name for a run started at `started`
    pub fn at(started: DateTime<Local>, suffix: &str) -> Result<Self> {
        Self::parse(format!("{}-{}", started.format("%Y%m%d%H%M%S"), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Remote identifier of one drained version of a local file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectName(String);

impl ObjectName {
    /// Build the object name for `file_name` at sequence `seq`
    pub fn new(file_name: &str, seq: u64) -> Self {
        Self(format!("{}-{}", file_name, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ObjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Per-file-name upload counters for the life of a run
///
/// A counter only moves forward after a successful upload, so a failed
/// upload leaves the next attempt with the same object name.
#[derive(Debug, Default, Clone)]
pub struct ObjectSequences {
    counters: HashMap<String, u64>,
}

impl ObjectSequences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object name the next upload of `file_name` will use
    pub fn next_name(&self, file_name: &str) -> ObjectName {
        ObjectName::new(file_name, self.uploads(file_name))
    }

    /// Record a successful upload of `file_name`
    pub fn commit(&mut self, file_name: &str) {
        *self.counters.entry(file_name.to_string()).or_insert(0) += 1;
    }

    /// Number of successful uploads of `file_name` so far
    pub fn uploads(&self, file_name: &str) -> u64 {
        self.counters.get(file_name).copied().unwrap_or(0)
    }
}

//! Pack - the persisted snapshot of a poll
//!
//! On disk a pack looks like:
//!
//! ```json
//! {
//!   "meta": { "creation": 1792152000000, "title": "Lunch" },
//!   "options": ["Pizza", "Sushi"]
//! }
//! ```

use crate::domain::naming::tokenize;
use crate::domain::poll::{Poll, PollError};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Pack metadata, returned on its own by directory listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackMeta {
    /// Creation time, epoch milliseconds
    pub creation: u64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackDefinition {
    meta: PackMeta,
    options: Vec<String>,
}

impl TryFrom<PackDefinition> for Pack {
    type Error = PollError;

    fn try_from(def: PackDefinition) -> Result<Self, Self::Error> {
        // Same rules as a live poll: non-empty title, 2 or 3 options
        Poll::new(def.meta.title.as_str(), def.options.iter().map(String::as_str))?;
        Ok(Self { meta: def.meta, options: def.options })
    }
}

/// Durable, write-once snapshot of a poll definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PackDefinition")]
pub struct Pack {
    meta: PackMeta,
    options: Vec<String>,
}

impl Pack {
    /// Snapshot a poll, stamped with `creation` (epoch ms)
    pub fn snapshot(poll: &Poll, creation: u64) -> Self {
        Self {
            meta: PackMeta { creation, title: poll.topic().to_string() },
            options: poll.options().to_vec(),
        }
    }

    pub fn meta(&self) -> &PackMeta {
        &self.meta
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Rebuild a live poll definition from this pack
    pub fn to_poll(&self) -> Result<Poll, PollError> {
        Poll::new(self.meta.title.as_str(), self.options.iter().map(String::as_str))
    }

    /// `{creation}-{title-token}.json`
    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.meta.creation, tokenize(&self.meta.title))
    }
}

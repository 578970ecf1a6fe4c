//! Poll definition and identifier types

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::borrow::Borrow;
use thiserror::Error;

/// Smallest number of options a poll may have
pub const MIN_OPTIONS: usize = 2;
/// Largest number of options a poll may have
pub const MAX_OPTIONS: usize = 3;

/// Poll validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("poll topic must not be empty")]
    EmptyTopic,
    #[error("a poll needs {MIN_OPTIONS} or {MAX_OPTIONS} options, got {0}")]
    InvalidOptionCount(usize),
}

/// Newtype wrapper for poll ids to keep them apart from other strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollId(String);

impl PollId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PollId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PollId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets maps keyed by PollId be queried with a plain &str
impl Borrow<str> for PollId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Unvalidated wire form of a poll
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PollDefinition {
    topic: String,
    options: Vec<String>,
}

impl TryFrom<PollDefinition> for Poll {
    type Error = PollError;

    fn try_from(def: PollDefinition) -> Result<Self, Self::Error> {
        Poll::new(def.topic, def.options)
    }
}

/// A topic and its 2 or 3 answer options, in display order.
///
/// Construction validates the option count, so every `Poll` in the system
/// is well-formed. Decoding from JSON goes through the same check.
///
/// # Example
///
/// ```
/// use livepoll::domain::poll::Poll;
///
/// let poll = Poll::new("Lunch", ["Pizza", "Sushi"]).unwrap();
/// assert_eq!(poll.options().len(), 2);
/// assert!(Poll::new("Lunch", ["Pizza"]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PollDefinition")]
pub struct Poll {
    topic: String,
    options: SmallVec<[String; MAX_OPTIONS]>,
}

impl Poll {
    pub fn new<T, I, S>(topic: T, options: I) -> Result<Self, PollError>
    where
        T: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(PollError::EmptyTopic);
        }

        let options: SmallVec<[String; MAX_OPTIONS]> = options.into_iter().map(Into::into).collect();
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
            return Err(PollError::InvalidOptionCount(options.len()));
        }

        Ok(Self { topic, options })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }
}

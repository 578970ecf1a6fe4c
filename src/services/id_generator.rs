//! Poll id generation from creation time and topic

use crate::domain::naming::tokenize;
use crate::domain::poll::PollId;
use chrono::{Local, NaiveDateTime};

/// Timestamp prefix format, one-second resolution
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Used when a topic has nothing left after sanitizing
const FALLBACK_TOPIC: &str = "untitled";

/// Source of ids for newly registered polls
pub trait PollIdGenerator: Send + Sync {
    fn generate_poll_id(&self, topic: &str) -> PollId;
}

/// Produces `{YYYY-MM-DD-HH-MM-SS}-{topic-token}` ids.
///
/// Topics are sanitized, never rejected. Two polls with the same topic created
/// within the same second get the same id; the registry reports that as a
/// duplicate instead of overwriting.
pub struct DateAndTopicIdGenerator {
    clock: Box<dyn Fn() -> NaiveDateTime + Send + Sync>,
}

impl DateAndTopicIdGenerator {
    /// Generator reading the local wall clock
    pub fn new() -> Self {
        Self::with_clock(|| Local::now().naive_local())
    }

    /// Generator with an injected clock, for tests and replays
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        Self { clock: Box::new(clock) }
    }

    /// Build the id for `topic` at a given instant
    pub fn poll_id_at(topic: &str, at: NaiveDateTime) -> PollId {
        let token = tokenize(topic);
        let token = if token.is_empty() { FALLBACK_TOPIC } else { token.as_str() };
        PollId::new(format!("{}-{}", at.format(TIMESTAMP_FORMAT), token))
    }
}

impl Default for DateAndTopicIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PollIdGenerator for DateAndTopicIdGenerator {
    fn generate_poll_id(&self, topic: &str) -> PollId {
        Self::poll_id_at(topic, (self.clock)())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(12, 0, 5).unwrap()
    }

    #[test]
    fn test_id_combines_timestamp_and_topic() {
        let id = DateAndTopicIdGenerator::poll_id_at("Lunch", noon());
        assert_eq!(id.as_str(), "2026-10-16-12-00-05-lunch");
    }

    #[test]
    fn test_topic_is_sanitized() {
        let id = DateAndTopicIdGenerator::poll_id_at("Where's the party?", noon());
        assert_eq!(id.as_str(), "2026-10-16-12-00-05-wheres-the-party");
    }

    #[test]
    fn test_unusable_topic_falls_back() {
        let id = DateAndTopicIdGenerator::poll_id_at("???", noon());
        assert_eq!(id.as_str(), "2026-10-16-12-00-05-untitled");
    }

    #[test]
    fn test_injected_clock_is_used() {
        let generator = DateAndTopicIdGenerator::with_clock(noon);
        assert_eq!(generator.generate_poll_id("Lunch").as_str(), "2026-10-16-12-00-05-lunch");
    }

    #[test]
    fn test_wall_clock_id_has_timestamp_prefix() {
        let id = DateAndTopicIdGenerator::new().generate_poll_id("Lunch");
        assert!(id.as_str().ends_with("-lunch"));
        // YYYY-MM-DD-HH-MM-SS is 19 chars
        let stamp = &id.as_str()[..19];
        assert!(NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok());
    }
}

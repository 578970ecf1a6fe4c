//! Domain models - polls, packs and the naming rules that tie them together
//!
//! - `Poll` / `PollId` - a live poll definition and its external handle
//! - `Pack` / `PackMeta` - the persisted snapshot of a poll
//! - `naming` - sanitize/hyphenize rules for tokens and filenames

pub mod naming;
pub mod pack;
pub mod poll;

// Re-export commonly used types at module level
pub use pack::{epoch_ms, Pack, PackMeta};
pub use poll::{Poll, PollError, PollId};

//! Services - poll lifecycle and voting logic
//!
//! This module contains the core business logic services:
//! - `id_generator` - Date + topic poll ids
//! - `registry` - In-memory index of live polls
//! - `voting` - Per-option QR artifact pipeline
//! - `access` - Same-host access guard
//! - `poll_service` - Create/render/vote/persist operations used by the HTTP layer

pub mod access;
pub mod id_generator;
pub mod poll_service;
pub mod registry;
pub mod voting;

// Re-export commonly used types
pub use access::{Access, AccessGuard};
pub use id_generator::{DateAndTopicIdGenerator, PollIdGenerator};
pub use poll_service::{CreatedPoll, PollService, PollView, ServiceError};
pub use registry::{PollRegistry, RegistryError};
pub use voting::{VotingError, VotingPipeline, VotingTarget};

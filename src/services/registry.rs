//! In-memory index of live polls
//!
//! The registry is the single source of truth for polls while the process
//! runs. It is constructed explicitly and handed to consumers as an
//! `Arc<PollRegistry>`; nothing here is persisted.

use crate::domain::poll::{Poll, PollId};
use crate::services::id_generator::PollIdGenerator;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("poll id {0} is already registered")]
    DuplicateId(PollId),
}

#[derive(Default)]
struct RegistryState {
    polls: FxHashMap<PollId, Poll>,
    // Insertion order, for listings
    order: Vec<PollId>,
}

/// Live polls keyed by generated id
pub struct PollRegistry {
    id_generator: Box<dyn PollIdGenerator>,
    state: RwLock<RegistryState>,
}

impl PollRegistry {
    pub fn new(id_generator: impl PollIdGenerator + 'static) -> Self {
        Self { id_generator: Box::new(id_generator), state: RwLock::new(RegistryState::default()) }
    }

    /// Register a poll under a freshly generated id.
    ///
    /// Never overwrites: if the generator hands out an id that is already
    /// taken, the poll is rejected with [`RegistryError::DuplicateId`].
    pub fn add_poll(&self, poll: Poll) -> Result<PollId, RegistryError> {
        let poll_id = self.id_generator.generate_poll_id(poll.topic());

        let mut state = self.state.write();
        if state.polls.contains_key(&poll_id) {
            warn!(poll_id = %poll_id, "poll_id_collision");
            return Err(RegistryError::DuplicateId(poll_id));
        }

        info!(poll_id = %poll_id, topic = %poll.topic(), options = %poll.options().len(), "poll_registered");
        state.polls.insert(poll_id.clone(), poll);
        state.order.push(poll_id.clone());
        Ok(poll_id)
    }

    /// Drop a poll; returns it if it was registered
    pub fn remove_poll(&self, poll_id: &str) -> Option<Poll> {
        let mut state = self.state.write();
        let poll = state.polls.remove(poll_id)?;
        state.order.retain(|id| id.as_str() != poll_id);
        info!(poll_id = %poll_id, "poll_removed");
        Some(poll)
    }

    /// Look up a poll; `None` for unknown ids
    pub fn get_poll_by_identifier(&self, poll_id: &str) -> Option<Poll> {
        self.state.read().polls.get(poll_id).cloned()
    }

    pub fn is_existent_poll(&self, poll_id: &str) -> bool {
        self.state.read().polls.contains_key(poll_id)
    }

    /// All polls in registration order
    pub fn polls(&self) -> Vec<(PollId, Poll)> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.polls.get(id).map(|poll| (id.clone(), poll.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

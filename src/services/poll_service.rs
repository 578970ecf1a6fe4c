//! Poll lifecycle operations exposed to the HTTP layer
//!
//! Composes the registry, the voting pipeline and pack storage. The registry
//! and the pack store are never synchronized implicitly: packs are written
//! by `persist_poll` and turned back into live polls by `launch_pack`.

use crate::domain::pack::{epoch_ms, Pack, PackMeta};
use crate::domain::poll::{Poll, PollError, PollId};
use crate::io::persistence::{PackError, PackStore};
use crate::services::registry::{PollRegistry, RegistryError};
use crate::services::voting::{option_tokens, OptionToken, VotingError, VotingPipeline, VotingTarget};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Voting(#[from] VotingError),
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error("unknown poll {0}")]
    UnknownPoll(String),
    #[error("poll {poll_id} has no option {token:?}")]
    UnknownOption { poll_id: String, token: String },
}

impl ServiceError {
    /// True for errors caused by the request rather than the environment
    pub fn is_client_error(&self) -> bool {
        match self {
            ServiceError::Poll(_) | ServiceError::Registry(_) => true,
            ServiceError::Voting(e) => matches!(
                e,
                VotingError::DuplicateOptionToken { .. }
                    | VotingError::EmptyOptionToken(_)
                    | VotingError::InvalidToken(_)
            ),
            ServiceError::Pack(e) => matches!(
                e,
                PackError::InvalidFileName(_)
                    | PackError::DeleteRejected { .. }
                    | PackError::Deserialization { .. }
                    | PackError::InvalidPack(_)
            ),
            ServiceError::UnknownPoll(_) | ServiceError::UnknownOption { .. } => false,
        }
    }

    /// True for lookups of things that do not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::UnknownPoll(_)
                | ServiceError::UnknownOption { .. }
                | ServiceError::Voting(VotingError::ArtifactNotFound(_))
                | ServiceError::Pack(PackError::NotFound(_))
        )
    }
}

/// Result of a successful poll creation
#[derive(Debug, Clone)]
pub struct CreatedPoll {
    pub poll_id: PollId,
    pub targets: Vec<VotingTarget>,
}

/// One option as shown on the poll page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub text: String,
    pub code: String,
}

impl From<OptionToken> for OptionView {
    fn from(token: OptionToken) -> Self {
        Self { text: token.label, code: token.token }
    }
}

/// Everything the poll page needs. `middle` is only set for 3-option polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollView {
    pub poll_id: PollId,
    pub topic: String,
    pub first: OptionView,
    pub middle: Option<OptionView>,
    pub last: OptionView,
}

pub struct PollService {
    registry: Arc<PollRegistry>,
    pipeline: VotingPipeline,
    store: PackStore,
}

impl PollService {
    pub fn new(registry: Arc<PollRegistry>, pipeline: VotingPipeline, store: PackStore) -> Self {
        Self { registry, pipeline, store }
    }

    pub fn registry(&self) -> &PollRegistry {
        &self.registry
    }

    pub fn store(&self) -> &PackStore {
        &self.store
    }

    /// Register `poll` and export its QR artifacts.
    ///
    /// Option tokens are validated before registration. If artifact export
    /// fails afterwards the poll is unregistered again, so the caller can
    /// simply retry; artifacts already written stay on disk and are
    /// overwritten by the retry.
    pub fn create_poll(&self, poll: Poll) -> Result<CreatedPoll, ServiceError> {
        option_tokens(&poll)?;
        let poll_id = self.registry.add_poll(poll.clone())?;
        let targets = match self.pipeline.generate_voting_targets(&poll_id, &poll) {
            Ok(targets) => targets,
            Err(e) => {
                warn!(poll_id = %poll_id, error = %e, "poll_creation_failed");
                self.registry.remove_poll(poll_id.as_str());
                return Err(e.into());
            }
        };
        info!(poll_id = %poll_id, topic = %poll.topic(), "poll_created");
        Ok(CreatedPoll { poll_id, targets })
    }

    /// Page data for a registered poll; `None` for unknown ids
    pub fn poll_view(&self, poll_id: &str) -> Option<PollView> {
        let poll = self.registry.get_poll_by_identifier(poll_id)?;
        let mut options: Vec<OptionView> =
            option_tokens(&poll).ok()?.into_iter().map(OptionView::from).collect();

        // 2 or 3 options, guaranteed by Poll
        let last = options.pop()?;
        let middle = if options.len() == 2 { options.pop() } else { None };
        let first = options.pop()?;

        Some(PollView { poll_id: PollId::new(poll_id), topic: poll.topic().to_string(), first, middle, last })
    }

    /// PNG bytes for one option of a registered poll
    pub fn qr_image(&self, poll_id: &str, token: &str) -> Result<Vec<u8>, ServiceError> {
        if !self.registry.is_existent_poll(poll_id) {
            return Err(ServiceError::UnknownPoll(poll_id.to_string()));
        }
        Ok(self.pipeline.load_artifact(&PollId::new(poll_id), token)?)
    }

    /// Acknowledge a scanned vote. Votes are not tallied.
    pub fn register_vote(&self, poll_id: &str, token: &str) -> Result<String, ServiceError> {
        let poll = self
            .registry
            .get_poll_by_identifier(poll_id)
            .ok_or_else(|| ServiceError::UnknownPoll(poll_id.to_string()))?;

        let known = option_tokens(&poll)?.into_iter().any(|t| t.token == token);
        if !known {
            return Err(ServiceError::UnknownOption {
                poll_id: poll_id.to_string(),
                token: token.to_string(),
            });
        }

        info!(poll_id = %poll_id, vote = %token, "vote_registered");
        Ok(format!("I registered your vote \"{token}\". Thank you for your participation."))
    }

    /// Snapshot a registered poll to disk
    pub fn persist_poll(&self, poll_id: &str) -> Result<PathBuf, ServiceError> {
        let poll = self
            .registry
            .get_poll_by_identifier(poll_id)
            .ok_or_else(|| ServiceError::UnknownPoll(poll_id.to_string()))?;
        Ok(self.store.persist_pack_to_disk(&Pack::snapshot(&poll, epoch_ms()))?)
    }

    /// Start a live poll from a saved pack
    pub fn launch_pack(&self, file_name: &str) -> Result<CreatedPoll, ServiceError> {
        let pack = self.store.load_pack_from_disk(file_name)?;
        info!(file = %file_name, title = %pack.meta().title, "pack_launched");
        self.create_poll(pack.to_poll()?)
    }

    pub fn pack_metas(&self) -> Result<BTreeMap<String, PackMeta>, ServiceError> {
        Ok(self.store.load_all_pack_metas()?)
    }

    /// Delete `{packs_dir}/{file_name}`; the store's validation gate decides
    pub fn delete_pack(&self, file_name: &str) -> Result<(), ServiceError> {
        Ok(self.store.delete_pack(self.store.packs_dir().join(file_name))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::qr::PngQrCodec;
    use crate::io::resource::{LanAddressResolver, LocalResourceEncoder, StaticAddress};
    use crate::services::id_generator::DateAndTopicIdGenerator;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::io;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::Path;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tempfile::{tempdir, TempDir};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(18, 0, 0).unwrap()
    }

    fn service(dir: &Path) -> PollService {
        let tick = AtomicI64::new(0);
        let generator = DateAndTopicIdGenerator::with_clock(move || {
            start() + chrono::Duration::seconds(tick.fetch_add(1, Ordering::Relaxed))
        });
        let encoder = Arc::new(LocalResourceEncoder::new(
            StaticAddress(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            8080,
        ));
        let pipeline =
            VotingPipeline::new(encoder, Arc::new(PngQrCodec::new(1, 1)), dir.join("qr"));
        PollService::new(
            Arc::new(PollRegistry::new(generator)),
            pipeline,
            PackStore::new(dir.join("base")),
        )
    }

    fn setup() -> (TempDir, PollService) {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        (dir, service)
    }

    #[test]
    fn test_create_poll_registers_and_exports() {
        let (_dir, service) = setup();
        let created = service.create_poll(Poll::new("Lunch", ["Pizza", "Sushi"]).unwrap()).unwrap();

        assert_eq!(created.poll_id.as_str(), "2026-10-16-18-00-00-lunch");
        assert_eq!(created.targets.len(), 2);
        assert!(service.registry().is_existent_poll(created.poll_id.as_str()));
    }

    #[test]
    fn test_duplicate_tokens_do_not_register() {
        let (_dir, service) = setup();
        let err = service.create_poll(Poll::new("Q", ["Yes!", "yes"]).unwrap()).unwrap_err();

        assert!(matches!(err, ServiceError::Voting(VotingError::DuplicateOptionToken { .. })));
        assert!(err.is_client_error());
        assert!(service.registry().is_empty());
    }

    #[test]
    fn test_poll_view_two_options() {
        let (_dir, service) = setup();
        let id = service.create_poll(Poll::new("Lunch", ["Pizza", "Sushi"]).unwrap()).unwrap().poll_id;

        let view = service.poll_view(id.as_str()).unwrap();
        assert_eq!(view.topic, "Lunch");
        assert_eq!(view.first, OptionView { text: "Pizza".into(), code: "pizza".into() });
        assert_eq!(view.middle, None);
        assert_eq!(view.last, OptionView { text: "Sushi".into(), code: "sushi".into() });
    }

    #[test]
    fn test_poll_view_three_options() {
        let (_dir, service) = setup();
        let poll = Poll::new("Ready?", ["Yes", "I don't know", "No"]).unwrap();
        let id = service.create_poll(poll).unwrap().poll_id;

        let view = service.poll_view(id.as_str()).unwrap();
        assert_eq!(view.first.code, "yes");
        assert_eq!(view.middle.unwrap().code, "i-dont-know");
        assert_eq!(view.last.code, "no");
    }

    #[test]
    fn test_poll_view_unknown() {
        let (_dir, service) = setup();
        assert!(service.poll_view("2026-10-16-18-00-00-nothing").is_none());
    }

    #[test]
    fn test_qr_image() {
        let (_dir, service) = setup();
        let id = service.create_poll(Poll::new("Lunch", ["Pizza", "Sushi"]).unwrap()).unwrap().poll_id;

        let png = service.qr_image(id.as_str(), "sushi").unwrap();
        assert_eq!(&png[1..4], b"PNG");

        let err = service.qr_image("unknown", "sushi").unwrap_err();
        assert!(err.is_not_found());
        let err = service.qr_image(id.as_str(), "burger").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_register_vote() {
        let (_dir, service) = setup();
        let id = service.create_poll(Poll::new("Lunch", ["Pizza", "Sushi"]).unwrap()).unwrap().poll_id;

        let ack = service.register_vote(id.as_str(), "pizza").unwrap();
        assert!(ack.contains("\"pizza\""));
        assert!(service.register_vote(id.as_str(), "burger").unwrap_err().is_not_found());
        assert!(service.register_vote("nope", "pizza").unwrap_err().is_not_found());
    }

    #[test]
    fn test_persist_and_launch_pack() {
        let (_dir, service) = setup();
        let id = service.create_poll(Poll::new("Lunch", ["Pizza", "Sushi"]).unwrap()).unwrap().poll_id;

        let path = service.persist_poll(id.as_str()).unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(file_name.ends_with("-lunch.json"));

        let metas = service.pack_metas().unwrap();
        assert_eq!(metas[&file_name].title, "Lunch");

        let relaunched = service.launch_pack(&file_name).unwrap();
        assert_ne!(relaunched.poll_id, id);
        assert_eq!(service.registry().len(), 2);

        service.delete_pack(&file_name).unwrap();
        assert!(service.pack_metas().unwrap().is_empty());
    }

    #[test]
    fn test_delete_pack_outside_dir_refused() {
        let (dir, service) = setup();
        let outside = dir.path().join("base").join("config.json");
        std::fs::create_dir_all(outside.parent().unwrap()).unwrap();
        std::fs::write(&outside, "{}").unwrap();

        let err = service.delete_pack("../config.json").unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Pack(PackError::DeleteRejected { .. })
        ));
        assert!(err.is_client_error());
        assert!(outside.exists());
    }

    struct NoLan;

    impl LanAddressResolver for NoLan {
        fn lan_address(&self) -> io::Result<IpAddr> {
            Err(io::Error::new(io::ErrorKind::AddrNotAvailable, "no interface"))
        }
    }

    #[test]
    fn test_failed_generation_unregisters_poll() {
        let dir = tempdir().unwrap();
        let generator = DateAndTopicIdGenerator::with_clock(start);
        let encoder = Arc::new(LocalResourceEncoder::new(NoLan, 8080));
        let pipeline =
            VotingPipeline::new(encoder, Arc::new(PngQrCodec::new(1, 1)), dir.path().join("qr"));
        let service = PollService::new(
            Arc::new(PollRegistry::new(generator)),
            pipeline,
            PackStore::new(dir.path().join("base")),
        );

        let poll = Poll::new("Lunch", ["Pizza", "Sushi"]).unwrap();
        let err = service.create_poll(poll.clone()).unwrap_err();
        assert!(matches!(err, ServiceError::Voting(VotingError::Resource(_))));
        assert!(!err.is_client_error());
        assert!(!service.registry().is_existent_poll("2026-10-16-18-00-00-lunch"));
        assert!(service.poll_view("2026-10-16-18-00-00-lunch").is_none());
        assert!(service.registry().is_empty());

        // same second, same topic: the retry is not blocked by a stale entry
        let err = service.create_poll(poll).unwrap_err();
        assert!(matches!(err, ServiceError::Voting(VotingError::Resource(_))));
    }

    #[test]
    fn test_persist_unknown_poll() {
        let (_dir, service) = setup();
        assert!(matches!(service.persist_poll("nope"), Err(ServiceError::UnknownPoll(_))));
    }
}

//! Voting pipeline: one scannable QR artifact per poll option
//!
//! Per option, in declared order:
//! label → token → resource URI → QR matrix → PNG at `{artifact_dir}/{poll_id}-{token}.png`
//!
//! Tokens are validated for the whole poll before anything is written. An
//! export failure midway leaves earlier artifacts in place; re-running for the
//! same poll overwrites them.

use crate::domain::naming::{is_token, tokenize};
use crate::domain::poll::{Poll, PollId};
use crate::io::qr::{QrCodec, QrError};
use crate::io::resource::{LocalResourceEncoder, ResourceError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum VotingError {
    #[error("options {first:?} and {second:?} both normalize to {token:?}")]
    DuplicateOptionToken { token: String, first: String, second: String },
    #[error("option {0:?} has no usable characters")]
    EmptyOptionToken(String),
    #[error("invalid option token {0:?}")]
    InvalidToken(String),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("QR generation for {token:?} failed: {source}")]
    Qr {
        token: String,
        #[source]
        source: QrError,
    },
    #[error("writing QR artifact {path} failed: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("QR artifact {0} not found")]
    ArtifactNotFound(PathBuf),
}

/// An option label paired with its normalized token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionToken {
    pub label: String,
    pub token: String,
}

/// A generated, scannable voting target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotingTarget {
    pub poll_id: PollId,
    pub label: String,
    pub token: String,
    /// URI encoded in the QR code
    pub resource: String,
    /// PNG written for this option
    pub artifact: PathBuf,
}

/// Tokens for every option of `poll`, in option order.
///
/// Fails if a label has no usable characters or two labels collapse onto
/// the same token (e.g. `"Yes!"` and `"yes"`).
pub fn option_tokens(poll: &Poll) -> Result<Vec<OptionToken>, VotingError> {
    let mut tokens: Vec<OptionToken> = Vec::with_capacity(poll.options().len());
    for label in poll.options() {
        let token = tokenize(label);
        if token.is_empty() {
            return Err(VotingError::EmptyOptionToken(label.clone()));
        }
        if let Some(existing) = tokens.iter().find(|t| t.token == token) {
            return Err(VotingError::DuplicateOptionToken {
                token,
                first: existing.label.clone(),
                second: label.clone(),
            });
        }
        tokens.push(OptionToken { label: label.clone(), token });
    }
    Ok(tokens)
}

/// Materializes QR artifacts for polls
pub struct VotingPipeline {
    encoder: Arc<LocalResourceEncoder>,
    codec: Arc<dyn QrCodec>,
    artifact_dir: PathBuf,
}

impl VotingPipeline {
    pub fn new(
        encoder: Arc<LocalResourceEncoder>,
        codec: Arc<dyn QrCodec>,
        artifact_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { encoder, codec, artifact_dir: artifact_dir.into() }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// `{artifact_dir}/{poll_id}-{token}.png`
    pub fn artifact_path(&self, poll_id: &PollId, token: &str) -> PathBuf {
        self.artifact_dir.join(format!("{poll_id}-{token}.png"))
    }

    /// Generate one QR artifact per option of `poll`.
    pub fn generate_voting_targets(
        &self,
        poll_id: &PollId,
        poll: &Poll,
    ) -> Result<Vec<VotingTarget>, VotingError> {
        let tokens = option_tokens(poll)?;
        // no LAN address, no poll: fail before anything is written
        self.encoder.lan_address()?;

        fs::create_dir_all(&self.artifact_dir).map_err(|source| VotingError::Export {
            path: self.artifact_dir.clone(),
            source,
        })?;

        let mut targets = Vec::with_capacity(tokens.len());
        for OptionToken { label, token } in tokens {
            let resource = self.encoder.build_resource_string(poll_id, &token)?;
            let artifact = self.export(poll_id, &token, &resource)?;
            debug!(poll_id = %poll_id, token = %token, resource = %resource, "qr_exported");
            targets.push(VotingTarget { poll_id: poll_id.clone(), label, token, resource, artifact });
        }

        info!(poll_id = %poll_id, artifacts = %targets.len(), "voting_targets_generated");
        Ok(targets)
    }

    /// Read back the PNG exported for (`poll_id`, `token`)
    pub fn load_artifact(&self, poll_id: &PollId, token: &str) -> Result<Vec<u8>, VotingError> {
        // both parts come from request paths; never let them shape the path freely
        if !is_token(poll_id.as_str()) || !is_token(token) {
            return Err(VotingError::InvalidToken(token.to_string()));
        }
        let path = self.artifact_path(poll_id, token);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(VotingError::ArtifactNotFound(path)),
            Err(source) => Err(VotingError::Export { path, source }),
        }
    }

    fn export(&self, poll_id: &PollId, token: &str, resource: &str) -> Result<PathBuf, VotingError> {
        let qr_err = |source| VotingError::Qr { token: token.to_string(), source };
        let matrix = self.codec.encode(resource).map_err(qr_err)?;
        let png = self.codec.render_png(&matrix).map_err(qr_err)?;

        let path = self.artifact_path(poll_id, token);
        if let Err(source) = fs::write(&path, png) {
            error!(path = %path.display(), error = %source, "qr_export_failed");
            return Err(VotingError::Export { path, source });
        }
        Ok(path)
    }
}

//! Pack persistence - JSON pack files under `{base_dir}/packs`
//!
//! Packs are write-once: a save creates `{creation}-{title-token}.json`, a
//! change means delete + save. Deletion goes through a fixed validation gate
//! so that a caller-supplied path can never remove a file outside a `packs`
//! directory.

use crate::domain::pack::{Pack, PackMeta};
use crate::domain::poll::PollError;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the pack directory inside the base directory
pub const PACKS_DIR: &str = "packs";
/// Extension every pack file carries
pub const PACK_SUFFIX: &str = ".json";

/// Why a delete request was refused. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeleteRejection {
    #[error("provided file is not a pack file")]
    NotPackFile,
    #[error("pack file cannot be deleted, because it does not exist")]
    Missing,
    #[error("provided path is not a regular file")]
    NotRegularFile,
    #[error("provided file is not in a valid pack location")]
    OutsidePackDir,
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("pack file {0} not found")]
    NotFound(PathBuf),
    #[error("invalid pack file name {0:?}")]
    InvalidFileName(String),
    #[error("pack file {path} is not a valid pack: {source}")]
    Deserialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid pack content: {0}")]
    InvalidPack(#[from] PollError),
    #[error("failed to serialize pack: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("refused to delete {path}: {reason}")]
    DeleteRejected { path: PathBuf, reason: DeleteRejection },
    #[error("no home directory to resolve relative base dir {0:?}")]
    HomeDirUnavailable(String),
    #[error("pack storage I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PackError {
    fn io(path: &Path, source: io::Error) -> Self {
        PackError::Io { path: path.to_path_buf(), source }
    }
}

/// Resolve a configured base dir: absolute paths as is, anything else below `home`
pub fn resolve_base_dir(configured: &str, home: Option<PathBuf>) -> Result<PathBuf, PackError> {
    let path = Path::new(configured);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    home.map(|home| home.join(path))
        .ok_or_else(|| PackError::HomeDirUnavailable(configured.to_string()))
}

/// File-backed pack storage
#[derive(Debug, Clone)]
pub struct PackStore {
    base_dir: PathBuf,
}

impl PackStore {
    /// Store rooted at an already resolved absolute directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        info!(base_dir = %base_dir.display(), "pack_store_initialized");
        Self { base_dir }
    }

    /// Store rooted at a configured path, relative paths resolving below `$HOME`.
    /// Resolution happens once, here.
    pub fn from_configured(configured: &str) -> Result<Self, PackError> {
        resolve_base_dir(configured, dirs::home_dir()).map(Self::new)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn packs_dir(&self) -> PathBuf {
        self.base_dir.join(PACKS_DIR)
    }

    /// Serialize `pack` to `{base}/packs/{creation}-{title-token}.json`.
    ///
    /// Returns the absolute path of the written file. An existing file with
    /// the same name is replaced.
    pub fn persist_pack_to_disk(&self, pack: &Pack) -> Result<PathBuf, PackError> {
        let json = serde_json::to_string_pretty(pack).map_err(PackError::Serialization)?;

        let packs_dir = self.packs_dir();
        fs::create_dir_all(&packs_dir).map_err(|e| PackError::io(&packs_dir, e))?;

        let path = packs_dir.join(pack.file_name());
        fs::write(&path, json).map_err(|e| PackError::io(&path, e))?;

        info!(path = %path.display(), title = %pack.meta().title, "pack_persisted");
        Ok(path)
    }

    /// Metadata of every pack in the pack directory, keyed by file name.
    ///
    /// Non-recursive. Keys are sorted by file name; a missing pack directory
    /// is an empty listing.
    pub fn load_all_pack_metas(&self) -> Result<BTreeMap<String, PackMeta>, PackError> {
        let packs_dir = self.packs_dir();
        let entries = match fs::read_dir(&packs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %packs_dir.display(), "pack_dir_missing");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(PackError::io(&packs_dir, e)),
        };

        let mut metas = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| PackError::io(&packs_dir, e))?;
            let file_type = entry.file_type().map_err(|e| PackError::io(&entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !file_name.ends_with(PACK_SUFFIX) {
                continue;
            }

            let pack = self.load_pack_from_disk(&file_name)?;
            metas.insert(file_name, pack.meta().clone());
        }

        debug!(count = %metas.len(), "pack_metas_loaded");
        Ok(metas)
    }

    /// Load `{base}/packs/{file_name}`.
    ///
    /// `file_name` must be a bare file name; anything that would leave the
    /// pack directory is rejected.
    pub fn load_pack_from_disk(&self, file_name: &str) -> Result<Pack, PackError> {
        if !is_plain_file_name(file_name) {
            return Err(PackError::InvalidFileName(file_name.to_string()));
        }

        let path = self.packs_dir().join(file_name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(PackError::NotFound(path)),
            Err(e) => return Err(PackError::io(&path, e)),
        };

        serde_json::from_str(&content).map_err(|source| PackError::Deserialization { path, source })
    }

    /// Delete a pack file after validating that it is one.
    ///
    /// Checks, in order, refusing on the first failure without touching the
    /// filesystem:
    /// 1. the path ends in `.json`
    /// 2. the path exists and is a regular file
    /// 3. its parent directory is named `packs`
    pub fn delete_pack(&self, path: impl AsRef<Path>) -> Result<(), PackError> {
        let path = path.as_ref();
        if let Err(reason) = validate_pack_path(path) {
            warn!(path = %path.display(), reason = %reason, "pack_delete_rejected");
            return Err(PackError::DeleteRejected { path: path.to_path_buf(), reason });
        }

        fs::remove_file(path).map_err(|e| PackError::io(path, e))?;
        info!(path = %path.display(), "pack_deleted");
        Ok(())
    }
}

/// The three-point pack check used before any deletion
fn validate_pack_path(path: &Path) -> Result<(), DeleteRejection> {
    let is_json = path.to_str().is_some_and(|p| p.ends_with(PACK_SUFFIX));
    if !is_json {
        return Err(DeleteRejection::NotPackFile);
    }

    // symlink_metadata: a link named *.json is not a pack file
    match fs::symlink_metadata(path) {
        Err(_) => return Err(DeleteRejection::Missing),
        Ok(meta) if !meta.file_type().is_file() => return Err(DeleteRejection::NotRegularFile),
        Ok(_) => {}
    }

    let parent_is_packs = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|name| name == PACKS_DIR);
    if !parent_is_packs {
        return Err(DeleteRejection::OutsidePackDir);
    }

    Ok(())
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

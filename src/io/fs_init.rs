//! Startup preparation of the on-disk layout
//!
//! ```text
//! {base_dir}/
//!   packs/            persisted pack files
//! {poll_tmp_dir}/     QR artifacts, {poll_id}-{token}.png
//! ```

use crate::domain::pack::{epoch_ms, Pack};
use crate::domain::poll::Poll;
use crate::io::persistence::{PackError, PackStore, PACK_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const SAMPLE_TITLE: &str = "Sample Poll";
const SAMPLE_OPTIONS: [&str; 2] = ["Yes", "No"];

/// Creates the directories the service writes to
pub struct FileSystemInitializer<'a> {
    store: &'a PackStore,
    artifact_dir: PathBuf,
    seed_sample_pack: bool,
}

impl<'a> FileSystemInitializer<'a> {
    pub fn new(store: &'a PackStore, artifact_dir: impl Into<PathBuf>, seed_sample_pack: bool) -> Self {
        Self { store, artifact_dir: artifact_dir.into(), seed_sample_pack }
    }

    /// Create base, pack and artifact directories; seed a sample pack into an
    /// empty pack directory if enabled.
    ///
    /// Returns the path of the seeded pack, if one was written.
    pub fn ensure_base_dir_ready(&self) -> Result<Option<PathBuf>, PackError> {
        let packs_dir = self.store.packs_dir();
        create_dir(self.store.base_dir())?;
        create_dir(&packs_dir)?;
        create_dir(&self.artifact_dir)?;

        if !self.seed_sample_pack || has_pack_files(&packs_dir)? {
            return Ok(None);
        }

        let poll = Poll::new(SAMPLE_TITLE, SAMPLE_OPTIONS)?;
        let path = self.store.persist_pack_to_disk(&Pack::snapshot(&poll, epoch_ms()))?;
        info!(path = %path.display(), "sample_pack_seeded");
        Ok(Some(path))
    }
}

fn create_dir(path: &Path) -> Result<(), PackError> {
    fs::create_dir_all(path).map_err(|source| PackError::Io { path: path.to_path_buf(), source })
}

fn has_pack_files(dir: &Path) -> Result<bool, PackError> {
    let entries =
        fs::read_dir(dir).map_err(|source| PackError::Io { path: dir.to_path_buf(), source })?;
    Ok(entries
        .filter_map(Result::ok)
        .any(|entry| entry.file_name().to_str().is_some_and(|name| name.ends_with(PACK_SUFFIX))))
}

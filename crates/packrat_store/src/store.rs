//! The content-addressed artifact store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use packrat_common::Fingerprint;

use crate::error::StoreError;

/// Result of inserting an artifact into the store.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PutOutcome {
    /// The entry was written by this call.
    Inserted,
    /// An identical entry already existed, possibly written by a
    /// concurrent invocation racing this one.
    AlreadyPresent,
}

/// A directory-backed, content-addressed blob store.
///
/// The store exclusively owns inserted blobs; callers only ever receive
/// read-only entry paths, never writable handles, so a caller cannot
/// corrupt content a concurrent process may be reading. Entries are
/// created, read, or deleted en masse, never mutated.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at the given directory.
    ///
    /// The directory itself is created lazily on first insert, so opening
    /// a store never touches the filesystem.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// The store's root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The entry path for a fingerprint.
    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(fingerprint.to_string())
    }

    /// Inserts the artifact at `source` under the given fingerprint.
    ///
    /// Idempotent: an existing entry under the same name is assumed
    /// byte-identical and left untouched. Prefers a hard link when source
    /// and store share a filesystem; otherwise copies byte for byte,
    /// preserving permission bits, staging through a temporary name so a
    /// concurrent reader can never observe a partial entry. A concurrent
    /// writer completing the same insert mid-call resolves as success.
    pub fn put(&self, fingerprint: &Fingerprint, source: &Path) -> Result<PutOutcome, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let entry = self.entry_path(fingerprint);
        if entry.exists() {
            return Ok(PutOutcome::AlreadyPresent);
        }

        match fs::hard_link(source, &entry) {
            Ok(()) => Ok(PutOutcome::Inserted),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(PutOutcome::AlreadyPresent),
            Err(_) => {
                // Cross-filesystem, or a transient race. Re-check, then
                // fall back to a staged copy.
                if entry.exists() {
                    return Ok(PutOutcome::AlreadyPresent);
                }
                let staging = self
                    .dir
                    .join(format!("{fingerprint}.tmp.{}", std::process::id()));
                fs::copy(source, &staging).map_err(|e| StoreError::io(&staging, e))?;
                fs::rename(&staging, &entry).map_err(|e| StoreError::io(&entry, e))?;
                Ok(PutOutcome::Inserted)
            }
        }
    }

    /// Looks up an entry, returning its read-only path if present.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        let entry = self.entry_path(fingerprint);
        entry.exists().then_some(entry)
    }

    /// Restores an entry to `target`, returning `false` when absent.
    ///
    /// Removes any existing artifact at `target`, creates parent
    /// directories as needed, links or copies the blob out of the store,
    /// and sets the restored artifact's modification time to now so a
    /// downstream freshness check treats it as freshly built.
    pub fn restore(&self, fingerprint: &Fingerprint, target: &Path) -> Result<bool, StoreError> {
        let Some(entry) = self.get(fingerprint) else {
            return Ok(false);
        };

        match fs::remove_file(target) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(target, e)),
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        if fs::hard_link(&entry, target).is_err() {
            fs::copy(&entry, target).map_err(|e| StoreError::io(target, e))?;
        }

        filetime::set_file_mtime(target, FileTime::now())
            .map_err(|e| StoreError::io(target, e))?;
        Ok(true)
    }

    /// Deletes the entire store directory and its contents.
    ///
    /// A missing directory is success: clearing an empty cache is a no-op.
    /// There is no selective eviction.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.dir, e)),
        }
    }
}

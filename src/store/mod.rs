//! The shared configuration store.
//!
//! # Data Flow
//! ```text
//! request handler
//!     → get(path)            lock-free load of the committed snapshot
//!     → set/delete(path)     staged working copy (store-wide or begin())
//!     → commit(description)
//!         → schema.rs        validate the whole staged document
//!         → commit lock      in-process mutex + advisory file lock
//!         → revision.rs      backup/config-<seq>.json
//!         → persist.rs       temp file + fsync + rename over config.json
//!         → publish          atomic swap of Arc<Snapshot>
//!         → prune            drop revisions beyond max_revisions
//! ```
//!
//! Commits replace the whole document: the last writer wins.
//!
//! Handles opened on the same data dir (in this process or another) pick up
//! each other's commits whenever they start staging, take a working copy,
//! commit, check [`WorkingCopy::is_stale`] or call [`ConfigStore::reload`].
//! Plain reads only ever load the handle's last published snapshot.

pub mod dirty;
pub(crate) mod persist;
pub mod revision;
pub mod session;

pub use dirty::DirtySubsystems;
pub use revision::{Revision, RevisionInfo};
pub use session::WorkingCopy;

use std::fs;
use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::config::StoreSettings;
use crate::document::{codec, ConfigNode, ConfigPath};
use crate::error::{PathError, PersistError, StoreError};
use crate::schema::Schema;
use persist::CommitLock;
use revision::{RevisionLog, encode_envelope, read_envelope};

/// A committed document together with its revision number.
#[derive(Debug)]
pub struct Snapshot {
    pub sequence: u64,
    pub document: ConfigNode,
}

/// Handle to the configuration store.
///
/// Cheap to clone; every clone shares the same document, staging area,
/// revision history and dirty markers. Pass it explicitly to whatever needs
/// configuration access.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    settings: StoreSettings,
    schema: Schema,
    current: ArcSwap<Snapshot>,
    staged: Mutex<Option<Staged>>,
    commit_lock: Mutex<()>,
    revisions: RevisionLog,
    dirty: DirtySubsystems,
}

/// The store-wide working copy and the revision it was taken from.
struct Staged {
    document: ConfigNode,
    base_sequence: u64,
}

impl ConfigStore {
    /// Open the store described by `settings`, loading the persisted
    /// document.
    ///
    /// A missing document starts an empty one. A document that fails to
    /// decode or validate is replaced by the newest revision that passes.
    pub fn open(settings: StoreSettings) -> Result<Self, StoreError> {
        settings.validate()?;
        let schema = settings.build_schema()?;

        fs::create_dir_all(&settings.data_dir).map_err(|source| PersistError::Write {
            path: settings.data_dir.clone(),
            source,
        })?;
        let revisions = RevisionLog::new(settings.revision_dir(), settings.max_revisions);

        // Cleanup and recovery must not race a commit in flight elsewhere.
        let snapshot = {
            let _file_lock = CommitLock::acquire(&settings.lock_path())?;
            persist::remove_stale_temp_files(&settings.data_dir);
            persist::remove_stale_temp_files(&settings.revision_dir());
            load_initial(&settings, &schema, &revisions)?
        };

        tracing::info!(
            data_dir = %settings.data_dir.display(),
            sequence = snapshot.sequence,
            max_revisions = settings.max_revisions,
            "Configuration store opened"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                settings,
                schema,
                current: ArcSwap::from_pointee(snapshot),
                staged: Mutex::new(None),
                commit_lock: Mutex::new(()),
                revisions,
                dirty: DirtySubsystems::new(),
            }),
        })
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    /// The current committed document. Never blocks on a commit.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.current.load_full()
    }

    pub fn current_sequence(&self) -> u64 {
        self.inner.current.load().sequence
    }

    /// Read a deep copy of the committed node at `path`.
    ///
    /// Returns `default` when any segment is absent. A malformed path is
    /// treated as absent; use [`ConfigStore::try_get`] to see the error.
    pub fn get(&self, path: &str, default: ConfigNode) -> ConfigNode {
        match self.try_get(path) {
            Ok(Some(node)) => node,
            Ok(None) => default,
            Err(e) => {
                tracing::debug!(path, error = %e, "Malformed path read as absent");
                default
            }
        }
    }

    pub fn try_get(&self, path: &str) -> Result<Option<ConfigNode>, PathError> {
        let path = ConfigPath::parse(path)?;
        let snapshot = self.inner.current.load();
        Ok(snapshot.document.resolve(&path).cloned())
    }

    /// Pick up a document committed through another handle on the same
    /// data dir.
    ///
    /// Returns `true` when a newer revision was found and published.
    pub fn reload(&self) -> Result<bool, StoreError> {
        let path = self.inner.settings.document_path();
        let (info, document) = match read_envelope(&path) {
            Ok(loaded) => loaded,
            Err(StoreError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(false)
            }
            Err(e) => return Err(e),
        };
        if info.sequence <= self.current_sequence() {
            return Ok(false);
        }
        self.inner.schema.validate(&document)?;

        let sequence = info.sequence;
        self.publish(Arc::new(Snapshot { sequence, document }));
        tracing::info!(
            sequence,
            description = %info.description,
            "Reloaded configuration committed elsewhere"
        );
        Ok(true)
    }

    /// [`ConfigStore::reload`] for callers that can carry on with the
    /// snapshot they already have.
    pub(crate) fn refresh(&self) {
        if let Err(e) = self.reload() {
            tracing::warn!(error = %e, "Failed to reload configuration");
        }
    }

    /// Swap in `snapshot` unless a newer one is already published.
    fn publish(&self, snapshot: Arc<Snapshot>) {
        self.inner.current.rcu(|current| {
            if current.sequence >= snapshot.sequence {
                Arc::clone(current)
            } else {
                Arc::clone(&snapshot)
            }
        });
    }

    /// Stage a write in the store-wide working copy.
    pub fn set(&self, path: &str, value: ConfigNode) -> Result<(), PathError> {
        let path = ConfigPath::parse(path)?;
        self.stage(|working| working.set_path(&path, value))
    }

    /// Stage removal of the node at `path`. Absent paths are a no-op.
    pub fn delete(&self, path: &str) -> Result<(), PathError> {
        let path = ConfigPath::parse(path)?;
        self.stage(|working| working.remove_path(&path).map(|_| ()))
    }

    /// Apply `edit` to the store-wide working copy. A failed edit on a fresh
    /// copy leaves nothing staged.
    fn stage<F>(&self, edit: F) -> Result<(), PathError>
    where
        F: FnOnce(&mut ConfigNode) -> Result<(), PathError>,
    {
        let mut staged = self.inner.staged.lock();
        if let Some(existing) = staged.as_mut() {
            return edit(&mut existing.document);
        }

        self.refresh();
        let snapshot = self.snapshot();
        let mut document = snapshot.document.clone();
        edit(&mut document)?;
        *staged = Some(Staged {
            document,
            base_sequence: snapshot.sequence,
        });
        Ok(())
    }

    /// Whether the store-wide working copy holds staged edits.
    pub fn has_pending(&self) -> bool {
        self.inner.staged.lock().is_some()
    }

    /// Drop the store-wide working copy.
    pub fn discard(&self) {
        if self.inner.staged.lock().take().is_some() {
            tracing::debug!("Staged changes discarded");
        }
    }

    /// Commit the store-wide working copy.
    ///
    /// With nothing staged the current document is written again as a new
    /// revision. The working copy is discarded whether or not the commit
    /// succeeds, so a retry starts from the committed document.
    pub fn commit(&self, description: &str) -> Result<Revision, StoreError> {
        let staged = self.inner.staged.lock().take();
        let (document, base_sequence) = match staged {
            Some(staged) => (staged.document, staged.base_sequence),
            None => {
                self.refresh();
                let snapshot = self.snapshot();
                (snapshot.document.clone(), snapshot.sequence)
            }
        };
        self.commit_document(document, Some(base_sequence), description)
    }

    /// Take an independent working copy of the latest committed document.
    pub fn begin(&self) -> WorkingCopy {
        self.refresh();
        let snapshot = self.snapshot();
        WorkingCopy::new(self.clone(), snapshot.document.clone(), snapshot.sequence)
    }

    /// Validate, persist and publish `document`.
    ///
    /// `base_sequence` is the revision the document was edited from; a
    /// newer committed revision is replaced with a warning.
    pub(crate) fn commit_document(
        &self,
        document: ConfigNode,
        base_sequence: Option<u64>,
        description: &str,
    ) -> Result<Revision, StoreError> {
        if let Err(e) = self.inner.schema.validate(&document) {
            tracing::warn!(description, error = %e, "Commit rejected by schema");
            return Err(e.into());
        }

        let _guard = self.inner.commit_lock.lock();
        let _file_lock = CommitLock::acquire(&self.inner.settings.lock_path())?;

        // Another handle sharing the data dir may have committed since we
        // last published; sequence numbers must still only grow.
        self.refresh();
        if let Some(base_sequence) = base_sequence {
            let current_sequence = self.current_sequence();
            if current_sequence != base_sequence {
                tracing::warn!(
                    base_sequence,
                    current_sequence,
                    description,
                    "Commit replaces a newer revision"
                );
            }
        }
        let sequence = self
            .current_sequence()
            .max(self.inner.revisions.latest_sequence())
            + 1;
        let info = RevisionInfo {
            sequence,
            timestamp: now_secs(),
            description: description.to_string(),
        };

        let content = codec::encode(&document).map_err(PersistError::from)?;
        let envelope = encode_envelope(&info, &document).map_err(PersistError::from)?;

        self.inner.revisions.write(sequence, &envelope)?;
        if let Err(e) = persist::write_atomic(&self.inner.settings.document_path(), &envelope) {
            self.inner.revisions.remove(sequence);
            tracing::error!(sequence, error = %e, "Failed to write configuration");
            return Err(e.into());
        }

        self.publish(Arc::new(Snapshot { sequence, document }));
        self.inner.revisions.prune();

        tracing::info!(
            sequence,
            description,
            bytes = content.len(),
            "Configuration committed"
        );

        Ok(Revision {
            sequence,
            timestamp: info.timestamp,
            description: info.description,
            content,
        })
    }

    /// Retained revisions, oldest first.
    pub fn revisions(&self) -> Result<Vec<RevisionInfo>, StoreError> {
        self.inner.revisions.list()
    }

    pub fn revision(&self, sequence: u64) -> Result<Revision, StoreError> {
        let (info, document) = self.inner.revisions.load(sequence)?;
        let content = codec::encode(&document).map_err(PersistError::from)?;
        Ok(Revision {
            sequence: info.sequence,
            timestamp: info.timestamp,
            description: info.description,
            content,
        })
    }

    /// Commit the document of a retained revision as a new revision.
    pub fn restore(&self, sequence: u64) -> Result<Revision, StoreError> {
        let (info, document) = self.inner.revisions.load(sequence)?;
        let description = format!("Reverted to revision {}: {}", sequence, info.description);
        let revision = self.commit_document(document, None, &description)?;
        tracing::info!(
            restored = sequence,
            sequence = revision.sequence,
            "Configuration restored"
        );
        Ok(revision)
    }

    pub fn mark_dirty(&self, subsystem: &str) {
        self.inner.dirty.mark(subsystem);
    }

    pub fn is_dirty(&self, subsystem: &str) -> bool {
        self.inner.dirty.is_dirty(subsystem)
    }

    pub fn clear_dirty(&self, subsystem: &str) {
        self.inner.dirty.clear(subsystem);
    }

    /// Clear `subsystem` and report whether it was dirty, atomically.
    pub fn take_dirty(&self, subsystem: &str) -> bool {
        self.inner.dirty.take(subsystem)
    }

    pub fn dirty_subsystems(&self) -> Vec<String> {
        self.inner.dirty.list()
    }

    pub fn dirty_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.inner.dirty.with_prefix(prefix)
    }

    /// Release this handle. Staged changes that were never committed are
    /// dropped with a warning once the last handle goes.
    pub fn close(self) {
        if Arc::strong_count(&self.inner) == 1 && self.has_pending() {
            tracing::warn!("Closing store with uncommitted staged changes");
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Pick the document to start from.
fn load_initial(
    settings: &StoreSettings,
    schema: &Schema,
    revisions: &RevisionLog,
) -> Result<Snapshot, StoreError> {
    let path = settings.document_path();

    let active_exists = match fs::metadata(&path) {
        Ok(_) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(source) => return Err(StoreError::Read { path, source }),
    };

    if active_exists {
        match read_envelope(&path) {
            Ok((info, document)) => match schema.validate(&document) {
                Ok(()) => {
                    revisions.discard_after(info.sequence);
                    return Ok(Snapshot {
                        sequence: info.sequence,
                        document,
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Active document fails validation")
                }
            },
            Err(e) => tracing::warn!(error = %e, "Active document unreadable"),
        }
    }

    let sequences = revisions
        .sequences()
        .map_err(|source| StoreError::Read {
            path: settings.revision_dir(),
            source,
        })?;

    if !active_exists && sequences.is_empty() {
        return Ok(Snapshot {
            sequence: 0,
            document: ConfigNode::empty_map(),
        });
    }

    for sequence in sequences.into_iter().rev() {
        let (info, document) = match revisions.load(sequence) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(sequence, error = %e, "Skipping unreadable revision");
                continue;
            }
        };
        if let Err(e) = schema.validate(&document) {
            tracing::warn!(sequence, error = %e, "Skipping invalid revision");
            continue;
        }

        let envelope = encode_envelope(&info, &document).map_err(PersistError::from)?;
        persist::write_atomic(&path, &envelope)?;
        revisions.discard_after(info.sequence);
        tracing::warn!(
            sequence = info.sequence,
            description = %info.description,
            "Recovered configuration from revision"
        );
        return Ok(Snapshot {
            sequence: info.sequence,
            document,
        });
    }

    Err(StoreError::NoUsableDocument {
        dir: settings.data_dir.clone(),
    })
}

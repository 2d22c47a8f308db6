//! Numbered revision files kept alongside the active document.
//!
//! Every commit writes `backup/config-<sequence>.json`. Each file, like the
//! active document, is an envelope holding the revision header and the
//! document itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::codec::to_pretty_bytes;
use crate::document::ConfigNode;
use crate::error::{PersistError, StoreError};
use crate::store::persist::write_atomic;

const FILE_PREFIX: &str = "config-";
const FILE_SUFFIX: &str = ".json";

/// Header of a persisted revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    pub sequence: u64,
    /// Unix seconds.
    #[serde(rename = "time")]
    pub timestamp: u64,
    pub description: String,
}

/// A persisted snapshot: header plus the encoded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub sequence: u64,
    pub timestamp: u64,
    pub description: String,
    /// Canonical encoding of the document (see [`crate::document::codec`]).
    pub content: Vec<u8>,
}

impl Revision {
    pub fn info(&self) -> RevisionInfo {
        RevisionInfo {
            sequence: self.sequence,
            timestamp: self.timestamp,
            description: self.description.clone(),
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    revision: &'a RevisionInfo,
    config: &'a ConfigNode,
}

#[derive(Deserialize)]
struct Envelope {
    revision: RevisionInfo,
    config: ConfigNode,
}

pub(crate) fn encode_envelope(
    info: &RevisionInfo,
    document: &ConfigNode,
) -> Result<Vec<u8>, serde_json::Error> {
    to_pretty_bytes(&EnvelopeRef {
        revision: info,
        config: document,
    })
}

pub(crate) fn decode_envelope(bytes: &[u8]) -> Result<(RevisionInfo, ConfigNode), serde_json::Error> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    Ok((envelope.revision, envelope.config))
}

/// Read and decode an envelope file.
pub(crate) fn read_envelope(path: &Path) -> Result<(RevisionInfo, ConfigNode), StoreError> {
    let bytes = fs::read(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_envelope(&bytes).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// The revision directory and its retention limit.
#[derive(Debug, Clone)]
pub(crate) struct RevisionLog {
    dir: PathBuf,
    max_revisions: usize,
}

impl RevisionLog {
    pub(crate) fn new(dir: PathBuf, max_revisions: usize) -> Self {
        Self { dir, max_revisions }
    }

    fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir
            .join(format!("{}{:010}{}", FILE_PREFIX, sequence, FILE_SUFFIX))
    }

    /// Retained sequence numbers, ascending. A missing directory is empty.
    pub(crate) fn sequences(&self) -> io::Result<Vec<u64>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut sequences: Vec<u64> = read_dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_prefix(FILE_PREFIX)?
                    .strip_suffix(FILE_SUFFIX)?
                    .parse()
                    .ok()
            })
            .collect();
        sequences.sort_unstable();
        Ok(sequences)
    }

    pub(crate) fn latest_sequence(&self) -> u64 {
        self.sequences()
            .ok()
            .and_then(|seqs| seqs.last().copied())
            .unwrap_or(0)
    }

    pub(crate) fn write(&self, sequence: u64, envelope: &[u8]) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistError::Write {
            path: self.dir.clone(),
            source,
        })?;
        write_atomic(&self.path_for(sequence), envelope)
    }

    /// Best-effort removal, used to roll back a revision whose commit failed.
    pub(crate) fn remove(&self, sequence: u64) {
        let path = self.path_for(sequence);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove revision file");
            }
        }
    }

    pub(crate) fn load(&self, sequence: u64) -> Result<(RevisionInfo, ConfigNode), StoreError> {
        let path = self.path_for(sequence);
        if !path.exists() {
            return Err(StoreError::RevisionNotFound(sequence));
        }
        read_envelope(&path)
    }

    /// Headers of every readable revision, ascending by sequence.
    ///
    /// Unreadable files are skipped with a warning.
    pub(crate) fn list(&self) -> Result<Vec<RevisionInfo>, StoreError> {
        let sequences = self.sequences().map_err(|source| StoreError::Read {
            path: self.dir.clone(),
            source,
        })?;

        let mut infos = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            match read_envelope(&self.path_for(sequence)) {
                Ok((info, _)) => infos.push(info),
                Err(e) => tracing::warn!(sequence, error = %e, "Skipping unreadable revision"),
            }
        }
        Ok(infos)
    }

    /// Delete the oldest revisions beyond the retention limit.
    ///
    /// Returns the pruned sequence numbers.
    pub(crate) fn prune(&self) -> Vec<u64> {
        let sequences = match self.sequences() {
            Ok(sequences) => sequences,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to list revisions for pruning");
                return Vec::new();
            }
        };

        if sequences.len() <= self.max_revisions {
            return Vec::new();
        }

        let prune_count = sequences.len() - self.max_revisions;
        let mut pruned = Vec::with_capacity(prune_count);
        for sequence in sequences.into_iter().take(prune_count) {
            let path = self.path_for(sequence);
            match fs::remove_file(&path) {
                Ok(()) => pruned.push(sequence),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to prune revision")
                }
            }
        }
        tracing::debug!(?pruned, "Pruned old revisions");
        pruned
    }

    /// Remove revisions newer than `sequence`.
    ///
    /// Such files come from a commit interrupted after its revision file
    /// was written but before the active document was replaced.
    pub(crate) fn discard_after(&self, sequence: u64) {
        let Ok(sequences) = self.sequences() else {
            return;
        };
        for newer in sequences.into_iter().filter(|s| *s > sequence) {
            tracing::warn!(sequence = newer, "Discarding unpublished revision");
            self.remove(newer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn info(sequence: u64) -> RevisionInfo {
        RevisionInfo {
            sequence,
            timestamp: 1_700_000_000 + sequence,
            description: format!("change {}", sequence),
        }
    }

    fn write(log: &RevisionLog, sequence: u64) {
        let bytes = encode_envelope(&info(sequence), &ConfigNode::empty_map()).unwrap();
        log.write(sequence, &bytes).unwrap();
    }

    #[test]
    fn test_envelope_round_trip() {
        let mut document = ConfigNode::empty_map();
        document
            .set_path(&"system/hostname".parse().unwrap(), ConfigNode::from("fw"))
            .unwrap();

        let bytes = encode_envelope(&info(7), &document).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"time\""), "got: {text}");

        let (decoded_info, decoded_doc) = decode_envelope(&bytes).unwrap();
        assert_eq!(decoded_info, info(7));
        assert_eq!(decoded_doc, document);
    }

    #[test]
    fn test_sequences_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let log = RevisionLog::new(temp_dir.path().join("backup"), 10);
        assert!(log.sequences().unwrap().is_empty());

        for sequence in [3, 1, 12] {
            write(&log, sequence);
        }
        fs::write(temp_dir.path().join("backup").join("notes.txt"), b"ignored").unwrap();

        assert_eq!(log.sequences().unwrap(), vec![1, 3, 12]);
        assert_eq!(log.latest_sequence(), 12);
    }

    #[test]
    fn test_prune_removes_oldest() {
        let temp_dir = TempDir::new().unwrap();
        let log = RevisionLog::new(temp_dir.path().join("backup"), 3);
        for sequence in 1..=5 {
            write(&log, sequence);
        }

        assert_eq!(log.prune(), vec![1, 2]);
        assert_eq!(log.sequences().unwrap(), vec![3, 4, 5]);
        assert!(log.prune().is_empty());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let log = RevisionLog::new(temp_dir.path().join("backup"), 3);
        assert!(matches!(log.load(9), Err(StoreError::RevisionNotFound(9))));
    }

    #[test]
    fn test_list_skips_corrupt_files() {
        let temp_dir = TempDir::new().unwrap();
        let log = RevisionLog::new(temp_dir.path().join("backup"), 10);
        write(&log, 1);
        write(&log, 2);
        fs::write(log.path_for(2), b"{ truncated").unwrap();

        let infos = log.list().unwrap();
        assert_eq!(infos, vec![info(1)]);
    }

    #[test]
    fn test_discard_after() {
        let temp_dir = TempDir::new().unwrap();
        let log = RevisionLog::new(temp_dir.path().join("backup"), 10);
        for sequence in 1..=4 {
            write(&log, sequence);
        }
        log.discard_after(2);
        assert_eq!(log.sequences().unwrap(), vec![1, 2]);
    }
}

//! Durable, append-only progress checkpoints.
//!
//! Layout under the followers directory:
//!
//! ```text
//! <followers_dir>/<target>/<session_id>/checkpoint-00000001.json
//! <followers_dir>/<target>/<session_id>/checkpoint-00000002.json
//! ```
//!
//! Every checkpoint is a full snapshot, written to a temp file in the same
//! directory and renamed into place, so a crash mid-write never leaves a
//! truncated file behind. Within a session the record count never shrinks.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ghostwatch_core::{FollowerSnapshot, Record};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::StoreError;

const CHECKPOINT_PREFIX: &str = "checkpoint-";
const CHECKPOINT_SUFFIX: &str = ".json";

/// Where the collection loop hands its snapshots.
pub trait CheckpointSink: Send {
    /// Persists the full record list for `session_id`.
    ///
    /// # Errors
    ///
    /// Implementation specific; the loop logs and continues.
    fn checkpoint(&mut self, session_id: &str, records: &[Record]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    pub target: String,
    pub sequence: u64,
    pub saved_at: DateTime<Utc>,
    pub total_records: usize,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub checkpoints: usize,
    pub latest_sequence: u64,
    pub total_records: usize,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ProgressStore {
    root: PathBuf,
    target: String,
    last_sizes: HashMap<String, usize>,
}

impl ProgressStore {
    /// Opens the store for `target` under `followers_dir`. Nothing is created
    /// on disk until the first checkpoint.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidComponent`] if `target` is not a plain name.
    pub fn open(followers_dir: impl Into<PathBuf>, target: &str) -> Result<Self, StoreError> {
        validate_component(target)?;
        Ok(Self {
            root: followers_dir.into(),
            target: target.to_string(),
            last_sizes: HashMap::new(),
        })
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn target_dir(&self) -> PathBuf {
        self.root.join(&self.target)
    }

    fn session_dir(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        validate_component(session_id)?;
        Ok(self.target_dir().join(session_id))
    }

    /// Writes the next checkpoint for `session_id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Regression`] when `records` is smaller than the last
    /// checkpoint of the session, or any I/O or serialization failure.
    pub fn save(&mut self, session_id: &str, records: &[Record]) -> Result<PathBuf, StoreError> {
        let dir = self.session_dir(session_id)?;
        let files = checkpoint_files(&dir)?;

        let previous = match self.last_sizes.get(session_id) {
            Some(size) => Some(*size),
            None => match files.last() {
                Some((_, path)) => Some(read_json::<Checkpoint>(path)?.total_records),
                None => None,
            },
        };
        if let Some(previous) = previous {
            if records.len() < previous {
                return Err(StoreError::Regression {
                    session_id: session_id.to_string(),
                    previous,
                    attempted: records.len(),
                });
            }
        }

        let sequence = files.last().map_or(1, |(seq, _)| seq + 1);
        let checkpoint = Checkpoint {
            session_id: session_id.to_string(),
            target: self.target.clone(),
            sequence,
            saved_at: Utc::now(),
            total_records: records.len(),
            records: records.to_vec(),
        };
        let path = write_json_atomic(&dir, &checkpoint_file_name(sequence), &checkpoint)?;
        self.last_sizes
            .insert(session_id.to_string(), records.len());

        tracing::debug!(
            session_id,
            sequence,
            records = records.len(),
            path = %path.display(),
            "checkpoint written"
        );
        Ok(path)
    }

    /// Most recent checkpoint of one session.
    ///
    /// # Errors
    ///
    /// I/O or JSON failures reading the session directory.
    pub fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let dir = self.session_dir(session_id)?;
        match checkpoint_files(&dir)?.last() {
            Some((_, path)) => read_json(path).map(Some),
            None => Ok(None),
        }
    }

    /// Most recently saved checkpoint across every session of the target.
    ///
    /// # Errors
    ///
    /// I/O or JSON failures reading the target directory.
    pub fn load_latest_for_target(&self) -> Result<Option<Checkpoint>, StoreError> {
        let mut latest: Option<Checkpoint> = None;
        for session_id in self.session_ids()? {
            let Some(candidate) = self.load_latest(&session_id)? else {
                continue;
            };
            let newer = latest.as_ref().is_none_or(|current| {
                (candidate.saved_at, candidate.total_records)
                    > (current.saved_at, current.total_records)
            });
            if newer {
                latest = Some(candidate);
            }
        }
        Ok(latest)
    }

    /// One summary per session that has at least one checkpoint, oldest first.
    ///
    /// # Errors
    ///
    /// I/O or JSON failures reading the target directory.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut summaries = Vec::new();
        for session_id in self.session_ids()? {
            let files = checkpoint_files(&self.target_dir().join(&session_id))?;
            let Some((sequence, path)) = files.last() else {
                continue;
            };
            let latest: Checkpoint = read_json(path)?;
            summaries.push(SessionSummary {
                session_id,
                checkpoints: files.len(),
                latest_sequence: *sequence,
                total_records: latest.total_records,
                saved_at: latest.saved_at,
            });
        }
        summaries.sort_by(|a, b| a.saved_at.cmp(&b.saved_at));
        Ok(summaries)
    }

    /// Writes a merged or exported snapshot next to the session directories.
    ///
    /// # Errors
    ///
    /// I/O or serialization failures.
    pub fn write_snapshot(
        &self,
        snapshot: &FollowerSnapshot,
        file_name: &str,
    ) -> Result<PathBuf, StoreError> {
        validate_component(file_name)?;
        write_json_atomic(&self.target_dir(), file_name, snapshot)
    }

    fn session_ids(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.target_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl CheckpointSink for ProgressStore {
    fn checkpoint(&mut self, session_id: &str, records: &[Record]) -> Result<(), StoreError> {
        self.save(session_id, records).map(|_| ())
    }
}

/// Reads a follower snapshot file written by [`ProgressStore::write_snapshot`]
/// or by an earlier export.
///
/// # Errors
///
/// I/O or JSON failures.
pub fn read_snapshot(path: &Path) -> Result<FollowerSnapshot, StoreError> {
    read_json(path)
}

fn checkpoint_file_name(sequence: u64) -> String {
    format!("{CHECKPOINT_PREFIX}{sequence:08}{CHECKPOINT_SUFFIX}")
}

fn parse_sequence(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(CHECKPOINT_PREFIX)?
        .strip_suffix(CHECKPOINT_SUFFIX)?
        .parse()
        .ok()
}

/// Checkpoint files in `dir`, sorted by sequence. A missing dir is empty.
fn checkpoint_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        if let Some(seq) = name.to_str().and_then(parse_sequence) {
            files.push((seq, entry.path()));
        }
    }
    files.sort_by_key(|(seq, _)| *seq);
    Ok(files)
}

fn validate_component(value: &str) -> Result<(), StoreError> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\'])
        || value.contains('\0');
    if bad {
        Err(StoreError::InvalidComponent(value.to_string()))
    } else {
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        context: path.display().to_string(),
        source,
    })
}

fn write_json_atomic<T: Serialize>(
    dir: &Path,
    file_name: &str,
    value: &T,
) -> Result<PathBuf, StoreError> {
    let io_err = |source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| StoreError::Json {
            context: file_name.to_string(),
            source,
        })?;
        writer.flush().map_err(io_err)?;
    }
    tmp.as_file().sync_all().map_err(io_err)?;

    let dest = dir.join(file_name);
    tmp.persist(&dest).map_err(|e| StoreError::Io {
        path: dest.clone(),
        source: e.error,
    })?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(names: &[&str]) -> Vec<Record> {
        names.iter().map(|n| Record::new(*n, Utc::now())).collect()
    }

    #[test]
    fn sequences_increase_and_latest_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProgressStore::open(dir.path(), "target").unwrap();

        let first = store.save("s1", &records(&["a"])).unwrap();
        let second = store.save("s1", &records(&["a", "b"])).unwrap();
        assert!(first.ends_with("checkpoint-00000001.json"));
        assert!(second.ends_with("checkpoint-00000002.json"));

        let latest = store.load_latest("s1").unwrap().unwrap();
        assert_eq!(latest.sequence, 2);
        assert_eq!(latest.total_records, 2);
        assert_eq!(latest.target, "target");
    }

    #[test]
    fn shrinking_checkpoint_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProgressStore::open(dir.path(), "target").unwrap();
        store.save("s1", &records(&["a", "b", "c"])).unwrap();

        let err = store.save("s1", &records(&["a"])).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Regression { previous: 3, attempted: 1, .. }
        ));
        assert_eq!(store.load_latest("s1").unwrap().unwrap().total_records, 3);
    }

    #[test]
    fn regression_check_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        ProgressStore::open(dir.path(), "target")
            .unwrap()
            .save("s1", &records(&["a", "b"]))
            .unwrap();

        let mut reopened = ProgressStore::open(dir.path(), "target").unwrap();
        assert!(reopened.save("s1", &records(&["a"])).is_err());
        assert!(reopened.save("s1", &records(&["a", "b"])).is_ok());
    }

    #[test]
    fn equal_size_checkpoint_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProgressStore::open(dir.path(), "target").unwrap();
        store.save("s1", &records(&["a"])).unwrap();
        assert!(store.save("s1", &records(&["a"])).is_ok());
    }

    #[test]
    fn sessions_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProgressStore::open(dir.path(), "target").unwrap();
        store.save("s1", &records(&["a", "b", "c"])).unwrap();
        store.save("s2", &records(&["x"])).unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        let s1 = sessions.iter().find(|s| s.session_id == "s1").unwrap();
        assert_eq!(s1.total_records, 3);
        assert_eq!(s1.checkpoints, 1);
    }

    #[test]
    fn latest_for_target_picks_newest_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProgressStore::open(dir.path(), "target").unwrap();
        store.save("s1", &records(&["a"])).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save("s2", &records(&["x", "y"])).unwrap();

        let latest = store.load_latest_for_target().unwrap().unwrap();
        assert_eq!(latest.session_id, "s2");
    }

    #[test]
    fn empty_store_has_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::open(dir.path(), "target").unwrap();
        assert!(store.load_latest("missing").unwrap().is_none());
        assert!(store.load_latest_for_target().unwrap().is_none());
        assert!(store.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProgressStore::open(dir.path(), "../etc").is_err());
        let store = ProgressStore::open(dir.path(), "target").unwrap();
        assert!(matches!(
            store.load_latest(".."),
            Err(StoreError::InvalidComponent(_))
        ));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProgressStore::open(dir.path(), "target").unwrap();
        store.save("s1", &records(&["a"])).unwrap();
        let names: Vec<String> = fs::read_dir(dir.path().join("target").join("s1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["checkpoint-00000001.json"]);
    }

    #[test]
    fn snapshot_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProgressStore::open(dir.path(), "target").unwrap();
        let snapshot = FollowerSnapshot::new("target", records(&["a", "b"]), Utc::now());
        let path = store.write_snapshot(&snapshot, "merged.json").unwrap();
        let loaded = read_snapshot(&path).unwrap();
        assert_eq!(loaded.total_followers_collected, 2);
        assert_eq!(loaded.followers[1].username, "b");
    }

    #[test]
    fn sequence_parsing() {
        assert_eq!(parse_sequence("checkpoint-00000042.json"), Some(42));
        assert_eq!(parse_sequence("checkpoint-x.json"), None);
        assert_eq!(parse_sequence("merged.json"), None);
    }
}

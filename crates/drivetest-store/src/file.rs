//! File-backed progress store.
//!
//! Layout under the progress directory:
//!
//! ```text
//! c1_subject1.json   committed state
//! c1_subject1.lock   exclusive lock held for the length of an update
//! ```
//!
//! Commits write a temp file in the same directory, fsync it and rename it
//! over the state file, so readers see either the old or the new document.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use drivetest_core::error::{Result, TrainerError};
use drivetest_core::model::Partition;
use drivetest_core::progress::{ProgressState, ProgressStore};
use tempfile::NamedTempFile;

/// Default time to wait for a partition lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Stores each partition's progress as a JSON file.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self, partition: Partition) -> PathBuf {
        self.dir.join(format!("{}.json", partition.key()))
    }

    pub fn lock_path(&self, partition: Partition) -> PathBuf {
        self.dir.join(format!("{}.lock", partition.key()))
    }

    /// Take the partition's exclusive lock, polling until the timeout.
    fn lock(&self, partition: Partition) -> Result<PartitionLock> {
        fs::create_dir_all(&self.dir).map_err(|e| TrainerError::io(&self.dir, e))?;
        let path = self.lock_path(partition);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| TrainerError::io(&path, e))?;

        let started = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => return Ok(PartitionLock { _file: file }),
                Err(TryLockError::WouldBlock) => {
                    let waited = started.elapsed();
                    if waited >= self.lock_timeout {
                        tracing::warn!("gave up waiting for {} after {:?}", path.display(), waited);
                        return Err(TrainerError::ProgressLocked {
                            partition,
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(TryLockError::Error(e)) => return Err(TrainerError::io(&path, e)),
            }
        }
    }

    fn load(&self, partition: Partition) -> Result<ProgressState> {
        let path = self.state_path(partition);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ProgressState::default()),
            Err(e) => return Err(TrainerError::io(&path, e)),
        };
        let state: ProgressState =
            serde_json::from_str(&content).map_err(|e| TrainerError::CorruptProgress {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        state
            .validate()
            .map_err(|reason| TrainerError::CorruptProgress { path, reason })?;
        Ok(state)
    }

    /// Atomically replace the partition's state file.
    fn persist(&self, partition: Partition, state: &ProgressState) -> Result<()> {
        let path = self.state_path(partition);
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| TrainerError::io(&path, std::io::Error::other(e)))?;

        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| TrainerError::io(&self.dir, e))?;
        if let Err(e) = tmp.write_all(&json) {
            return Err(TrainerError::io(tmp.path(), e));
        }
        if let Err(e) = tmp.as_file().sync_all() {
            return Err(TrainerError::io(tmp.path(), e));
        }
        tmp.persist(&path)
            .map_err(|e| TrainerError::io(&path, e.error))?;

        // Make the rename itself durable.
        if let Err(e) = sync_dir(&self.dir) {
            tracing::warn!("rename in {} may not be durable: {e}", self.dir.display());
        }
        Ok(())
    }
}

/// Flush a directory entry so a rename inside it survives a crash.
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    File::open(dir)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Held for the duration of an update; the OS lock is released on drop.
struct PartitionLock {
    _file: File,
}

impl ProgressStore for FileProgressStore {
    fn read(&self, partition: Partition) -> Result<ProgressState> {
        self.load(partition)
    }

    fn update<T, F>(&self, partition: Partition, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut ProgressState) -> Result<T>,
    {
        let _lock = self.lock(partition)?;
        let mut state = self.load(partition)?;
        let value = mutation(&mut state)?;
        self.persist(partition, &state)?;
        tracing::debug!("committed progress for {partition}");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivetest_core::model::{QuestionId, Subject, VehicleType};

    fn c1s1() -> Partition {
        Partition::new(VehicleType::C1, Subject::One)
    }

    #[test]
    fn read_of_fresh_partition_is_default_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProgressStore::new(dir.path().join("progress"));
        assert_eq!(store.read(c1s1()).unwrap(), ProgressState::default());
        assert!(!store.dir().exists());
    }

    #[test]
    fn update_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProgressStore::new(dir.path());
        store
            .update(c1s1(), |s| {
                s.record_attempt(QuestionId(10001), false);
                s.set_favorite(QuestionId(10002), true);
                Ok(())
            })
            .unwrap();

        let reopened = FileProgressStore::new(dir.path());
        let state = reopened.read(c1s1()).unwrap();
        assert!(state.wrong_set.contains(&QuestionId(10001)));
        assert!(state.favorites.contains(&QuestionId(10002)));
        assert!(store.state_path(c1s1()).ends_with("c1_subject1.json"));
    }

    #[test]
    fn failed_mutation_keeps_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProgressStore::new(dir.path());
        store
            .update(c1s1(), |s| {
                s.record_attempt(QuestionId(1), true);
                Ok(())
            })
            .unwrap();
        let before = fs::read(store.state_path(c1s1())).unwrap();

        let err = store
            .update(c1s1(), |s| -> Result<()> {
                s.record_attempt(QuestionId(2), false);
                Err(TrainerError::InvalidScore { score: 120 })
            })
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_score");
        assert_eq!(fs::read(store.state_path(c1s1())).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_reported_and_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProgressStore::new(dir.path());
        fs::write(store.state_path(c1s1()), "{ not json").unwrap();

        let err = store.read(c1s1()).unwrap_err();
        assert!(matches!(err, TrainerError::CorruptProgress { .. }));
        let err = store.update(c1s1(), |_| Ok(())).unwrap_err();
        assert_eq!(err.kind(), "corrupt_progress");
        assert_eq!(fs::read_to_string(store.state_path(c1s1())).unwrap(), "{ not json");
    }

    #[test]
    fn held_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProgressStore::new(dir.path()).with_lock_timeout(Duration::from_millis(50));

        let holder = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(store.lock_path(c1s1()))
            .unwrap();
        holder.lock().unwrap();

        let err = store.update(c1s1(), |_| Ok(())).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, TrainerError::ProgressLocked { waited_ms, .. } if waited_ms >= 50));

        holder.unlock().unwrap();
        assert!(store.update(c1s1(), |_| Ok(())).is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn sync_dir_surfaces_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sync_dir(dir.path()).is_ok());
        assert!(sync_dir(&dir.path().join("gone")).is_err());
    }
}

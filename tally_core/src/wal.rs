//! Append-only log backing the file store.
//!
//! Every change is appended to a JSONL (JSON Lines) file as one tagged
//! record and fsynced before the call returns. Reading replays the log in
//! order, so the last record for an id wins. A sidecar `.lock` file guards
//! the log with `fs2` locks so several processes can share a data directory.

use crate::store::{ensure_owner, HabitStore, Record, Snapshot};
use crate::{Entry, Error, Habit, HabitId, HabitMode, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the log inside a data directory
pub const LOG_FILE_NAME: &str = "habits.jsonl";

/// Habit store persisted as a JSONL log
#[derive(Clone, Debug)]
pub struct JsonlStore {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Held for the duration of one store operation
struct LogLock {
    file: File,
}

impl Drop for LogLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl JsonlStore {
    /// Create a store for the given log path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self { path, lock_path }
    }

    /// Create a store using the standard log name inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(LOG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        std::fs::create_dir_all(self.parent_dir())
            .map_err(|e| Error::persistence("create data directory", e))
    }

    fn lock(&self, exclusive: bool) -> Result<LogLock> {
        self.ensure_parent_dir()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| Error::persistence("open lock file", e))?;

        let locked = if exclusive {
            file.lock_exclusive()
        } else {
            file.lock_shared()
        };
        locked.map_err(|e| Error::persistence("lock log", e))?;

        Ok(LogLock { file })
    }

    /// Replay the log into a snapshot, returning it with the number of
    /// records applied. Caller must hold the lock.
    fn replay(&self) -> Result<(Snapshot, usize)> {
        let mut snapshot = Snapshot::default();
        if !self.path.exists() {
            return Ok((snapshot, 0));
        }

        let file = File::open(&self.path).map_err(|e| Error::persistence("open log", e))?;
        let reader = BufReader::new(file);
        let mut applied = 0;

        for (line_num, chunk) in reader.split(b'\n').enumerate() {
            let bytes = chunk.map_err(|e| Error::persistence("read log", e))?;
            let line = match std::str::from_utf8(&bytes) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Skipping non-UTF-8 record at line {}: {}", line_num + 1, e);
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Record>(line) {
                Ok(record) => {
                    snapshot.apply(record);
                    applied += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to parse record at line {}: {}", line_num + 1, e);
                }
            }
        }

        tracing::debug!("Replayed {} records from {:?}", applied, self.path);
        Ok((snapshot, applied))
    }

    fn read_snapshot(&self) -> Result<Snapshot> {
        let _lock = self.lock(false)?;
        Ok(self.replay()?.0)
    }

    /// Append one record and sync it to disk. Caller must hold the
    /// exclusive lock.
    fn append(&self, record: &Record) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::persistence("open log for append", e))?;

        let mut line = serde_json::to_string(record)
            .map_err(|e| Error::persistence("serialize record", e))?;
        line.push('\n');

        // A torn final line must not swallow the record we are about to write
        if ends_mid_line(&mut file).map_err(|e| Error::persistence("inspect log tail", e))? {
            tracing::warn!("Log {:?} ends with a partial line, starting a new one", self.path);
            line.insert(0, '\n');
        }

        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| Error::persistence("append to log", e))?;

        Ok(())
    }

    /// Rewrite the log with one record per live habit and entry.
    ///
    /// The new log is written to a temp file, synced, then renamed over the
    /// old one. Returns how many superseded records were dropped.
    pub fn compact(&self) -> Result<usize> {
        let _lock = self.lock(true)?;
        let (snapshot, applied) = self.replay()?;
        let records = snapshot.to_records();

        let temp = NamedTempFile::new_in(self.parent_dir())
            .map_err(|e| Error::persistence("create temp log", e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            for record in &records {
                serde_json::to_writer(&mut writer, record)
                    .map_err(|e| Error::persistence("serialize record", e))?;
                writer
                    .write_all(b"\n")
                    .map_err(|e| Error::persistence("write temp log", e))?;
            }
            writer
                .flush()
                .map_err(|e| Error::persistence("write temp log", e))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| Error::persistence("sync temp log", e))?;
        temp.persist(&self.path)
            .map_err(|e| Error::persistence("replace log", e.error))?;

        let dropped = applied.saturating_sub(records.len());
        tracing::info!(
            "Compacted {:?}: kept {} records, dropped {}",
            self.path,
            records.len(),
            dropped
        );
        Ok(dropped)
    }
}

fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

impl HabitStore for JsonlStore {
    fn get_or_create_habit(&self, name: &str, mode: HabitMode) -> Result<Habit> {
        let _lock = self.lock(true)?;
        let (snapshot, _) = self.replay()?;
        if let Some(habit) = snapshot.habit_by_name(name) {
            return Ok(habit.clone());
        }

        let habit = Habit::new(name, mode)?;
        self.append(&Record::Habit(habit.clone()))?;
        tracing::info!("Created habit '{}' ({})", habit.name, habit.mode);
        Ok(habit)
    }

    fn find_habit(&self, name: &str) -> Result<Option<Habit>> {
        Ok(self.read_snapshot()?.habit_by_name(name).cloned())
    }

    fn list_habits(&self) -> Result<Vec<Habit>> {
        Ok(self.read_snapshot()?.habits().to_vec())
    }

    fn delete_habit(&self, id: HabitId) -> Result<usize> {
        let _lock = self.lock(true)?;
        let (mut snapshot, _) = self.replay()?;
        if snapshot.habit_by_id(id).is_none() {
            tracing::debug!("Habit {} already absent, nothing to delete", id);
            return Ok(0);
        }

        self.append(&Record::DeleteHabit { id })?;
        let removed = snapshot.remove_habit(id);
        tracing::info!("Deleted habit {} and {} entries", id, removed);
        Ok(removed)
    }

    fn load_entries(&self, habit_id: HabitId) -> Result<Vec<Entry>> {
        Ok(self.read_snapshot()?.entries_for(habit_id))
    }

    fn save_entry(&self, entry: &Entry) -> Result<()> {
        let _lock = self.lock(true)?;
        let (snapshot, _) = self.replay()?;
        ensure_owner(&snapshot, entry.habit_id)?;
        self.append(&Record::Entry(entry.clone()))?;
        tracing::debug!("Saved entry {} to {:?}", entry.id, self.path);
        Ok(())
    }

    fn update_entry(
        &self,
        habit_id: HabitId,
        build: &mut dyn FnMut(Vec<Entry>) -> Entry,
    ) -> Result<Entry> {
        // The exclusive lock spans the read and the append, so other
        // processes cannot slip a write in between.
        let _lock = self.lock(true)?;
        let (snapshot, _) = self.replay()?;
        ensure_owner(&snapshot, habit_id)?;

        let entry = build(snapshot.entries_for(habit_id));
        ensure_owner(&snapshot, entry.habit_id)?;
        self.append(&Record::Entry(entry.clone()))?;
        tracing::debug!("Updated entry {} in {:?}", entry.id, self.path);
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn create_test_entry(habit: &Habit, days_ago: i64, is_success: bool) -> Entry {
        let date = Utc::now() - Duration::days(days_ago);
        Entry {
            id: Uuid::new_v4(),
            habit_id: habit.id,
            date,
            is_success,
            craving_level: Some(3),
            note: Some("steady".into()),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_load_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::in_dir(temp_dir.path());

        let habit = store.get_or_create_habit("No smoking", HabitMode::Negative).unwrap();
        let entry = create_test_entry(&habit, 0, true);
        store.save_entry(&entry).unwrap();

        let entries = store.load_entries(habit.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], entry);
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let habit = {
            let store = JsonlStore::in_dir(temp_dir.path());
            let habit = store.get_or_create_habit("No smoking", HabitMode::Negative).unwrap();
            store.save_entry(&create_test_entry(&habit, 1, true)).unwrap();
            habit
        };

        let reopened = JsonlStore::in_dir(temp_dir.path());
        let again = reopened
            .get_or_create_habit("No smoking", HabitMode::Negative)
            .unwrap();
        assert_eq!(again, habit);
        assert_eq!(reopened.load_entries(habit.id).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_log_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::in_dir(&temp_dir.path().join("nested"));
        assert!(store.list_habits().unwrap().is_empty());
        assert!(store.find_habit("anything").unwrap().is_none());
    }

    #[test]
    fn test_last_record_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::in_dir(temp_dir.path());
        let habit = store.get_or_create_habit("Running", HabitMode::Positive).unwrap();

        let mut entry = create_test_entry(&habit, 0, true);
        store.save_entry(&entry).unwrap();
        entry.is_success = false;
        entry.note = None;
        store.save_entry(&entry).unwrap();

        let entries = store.load_entries(habit.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_success);
        assert_eq!(entries[0].note, None);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::in_dir(temp_dir.path());
        let habit = store.get_or_create_habit("Running", HabitMode::Positive).unwrap();
        store.save_entry(&create_test_entry(&habit, 2, true)).unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        file.write_all(b"{ invalid json }\n\xff\xfe\n").unwrap();
        drop(file);

        store.save_entry(&create_test_entry(&habit, 1, true)).unwrap();
        assert_eq!(store.load_entries(habit.id).unwrap().len(), 2);
    }

    #[test]
    fn test_torn_tail_does_not_swallow_next_record() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::in_dir(temp_dir.path());
        let habit = store.get_or_create_habit("Running", HabitMode::Positive).unwrap();

        // Simulate a crash halfway through writing a line
        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        file.write_all(br#"{"op":"entry","id":"#).unwrap();
        drop(file);

        store.save_entry(&create_test_entry(&habit, 0, true)).unwrap();
        assert_eq!(store.load_entries(habit.id).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_habit_persists_cascade() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::in_dir(temp_dir.path());
        let habit = store.get_or_create_habit("Running", HabitMode::Positive).unwrap();
        for days_ago in 0..3 {
            store.save_entry(&create_test_entry(&habit, days_ago, true)).unwrap();
        }

        assert_eq!(store.delete_habit(habit.id).unwrap(), 3);
        assert_eq!(store.delete_habit(habit.id).unwrap(), 0);

        let reopened = JsonlStore::in_dir(temp_dir.path());
        assert!(reopened.list_habits().unwrap().is_empty());
        assert!(reopened.load_entries(habit.id).unwrap().is_empty());

        // Saving into a deleted habit is rejected
        let result = reopened.save_entry(&create_test_entry(&habit, 0, true));
        assert!(matches!(result, Err(Error::Persistence(_))));
    }

    #[test]
    fn test_compact_drops_superseded_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::in_dir(temp_dir.path());
        let habit = store.get_or_create_habit("Running", HabitMode::Positive).unwrap();

        let mut entry = create_test_entry(&habit, 0, true);
        for _ in 0..4 {
            entry.is_success = !entry.is_success;
            store.save_entry(&entry).unwrap();
        }
        let gone = store.get_or_create_habit("Gone", HabitMode::Negative).unwrap();
        store.save_entry(&create_test_entry(&gone, 0, true)).unwrap();
        store.delete_habit(gone.id).unwrap();

        let before = store.load_entries(habit.id).unwrap();
        let dropped = store.compact().unwrap();
        // 8 records in: two habits, five entry saves, one delete.
        // 2 records out: the live habit and its latest entry.
        assert_eq!(dropped, 6);

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert_eq!(store.load_entries(habit.id).unwrap(), before);
    }

    #[test]
    fn test_compact_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::in_dir(temp_dir.path());
        store.get_or_create_habit("Running", HabitMode::Positive).unwrap();
        store.compact().unwrap();

        let mut names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["habits.jsonl".to_string(), "habits.lock".to_string()]);
    }
}

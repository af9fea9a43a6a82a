//! Durable store contract consumed by the ledger.
//!
//! The ledger never touches files itself; it talks to a [`HabitStore`].
//! [`crate::wal::JsonlStore`] is the file-backed implementation and
//! [`MemoryStore`] keeps everything in process.

use crate::{Entry, EntryId, Error, Habit, HabitId, HabitMode, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage capabilities required by the ledger and the application bootstrap.
///
/// Every write must be durable by the time the call returns `Ok`.
pub trait HabitStore {
    /// Return the habit with this name, creating it on first use
    fn get_or_create_habit(&self, name: &str, mode: HabitMode) -> Result<Habit>;

    /// Look up a habit by name without creating it
    fn find_habit(&self, name: &str) -> Result<Option<Habit>>;

    /// All habits in creation order
    fn list_habits(&self) -> Result<Vec<Habit>>;

    /// Delete a habit and every entry it owns, returning the entry count
    fn delete_habit(&self, id: HabitId) -> Result<usize>;

    /// Entries owned by the habit, ascending by date
    fn load_entries(&self, habit_id: HabitId) -> Result<Vec<Entry>>;

    /// Insert the entry or replace the stored entry with the same id
    fn save_entry(&self, entry: &Entry) -> Result<()>;

    /// Hand the habit's current entries to `build` and save the entry it
    /// returns, with no other writer of this store in between.
    fn update_entry(
        &self,
        habit_id: HabitId,
        build: &mut dyn FnMut(Vec<Entry>) -> Entry,
    ) -> Result<Entry>;
}

/// One change in the store's history
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Record {
    Habit(Habit),
    Entry(Entry),
    DeleteHabit { id: HabitId },
}

/// Live view of the store after applying records in order
#[derive(Clone, Debug, Default)]
pub(crate) struct Snapshot {
    habits: Vec<Habit>,
    entries: HashMap<EntryId, Entry>,
}

impl Snapshot {
    pub(crate) fn apply(&mut self, record: Record) {
        match record {
            Record::Habit(habit) => match self.habits.iter_mut().find(|h| h.id == habit.id) {
                Some(existing) => *existing = habit,
                None => self.habits.push(habit),
            },
            Record::Entry(entry) => {
                if self.habit_by_id(entry.habit_id).is_some() {
                    self.entries.insert(entry.id, entry);
                } else {
                    tracing::warn!(
                        "Dropping entry {} for unknown habit {}",
                        entry.id,
                        entry.habit_id
                    );
                }
            }
            Record::DeleteHabit { id } => {
                self.remove_habit(id);
            }
        }
    }

    pub(crate) fn habit_by_id(&self, id: HabitId) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == id)
    }

    pub(crate) fn habit_by_name(&self, name: &str) -> Option<&Habit> {
        let name = name.trim();
        self.habits.iter().find(|h| h.name == name)
    }

    pub(crate) fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub(crate) fn entries_for(&self, habit_id: HabitId) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .entries
            .values()
            .filter(|e| e.habit_id == habit_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.updated_at.cmp(&b.updated_at)));
        entries
    }

    /// Removes the habit and cascades to its entries
    pub(crate) fn remove_habit(&mut self, id: HabitId) -> usize {
        self.habits.retain(|h| h.id != id);
        let before = self.entries.len();
        self.entries.retain(|_, e| e.habit_id != id);
        before - self.entries.len()
    }

    /// Minimal record sequence that rebuilds this snapshot
    pub(crate) fn to_records(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.habits.iter().cloned().map(Record::Habit).collect();
        for habit in &self.habits {
            records.extend(self.entries_for(habit.id).into_iter().map(Record::Entry));
        }
        records
    }
}

/// Check that entries may be written for `habit_id`
pub(crate) fn ensure_owner(snapshot: &Snapshot, habit_id: HabitId) -> Result<()> {
    if snapshot.habit_by_id(habit_id).is_none() {
        return Err(Error::Persistence(format!("unknown habit {}", habit_id)));
    }
    Ok(())
}

/// Store that lives entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_snapshot<T>(&self, f: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| Error::Persistence("memory store lock poisoned".into()))?;
        f(&mut *guard)
    }
}

impl HabitStore for MemoryStore {
    fn get_or_create_habit(&self, name: &str, mode: HabitMode) -> Result<Habit> {
        self.with_snapshot(|snapshot| {
            if let Some(habit) = snapshot.habit_by_name(name) {
                return Ok(habit.clone());
            }
            let habit = Habit::new(name, mode)?;
            snapshot.apply(Record::Habit(habit.clone()));
            Ok(habit)
        })
    }

    fn find_habit(&self, name: &str) -> Result<Option<Habit>> {
        self.with_snapshot(|snapshot| Ok(snapshot.habit_by_name(name).cloned()))
    }

    fn list_habits(&self) -> Result<Vec<Habit>> {
        self.with_snapshot(|snapshot| Ok(snapshot.habits().to_vec()))
    }

    fn delete_habit(&self, id: HabitId) -> Result<usize> {
        self.with_snapshot(|snapshot| Ok(snapshot.remove_habit(id)))
    }

    fn load_entries(&self, habit_id: HabitId) -> Result<Vec<Entry>> {
        self.with_snapshot(|snapshot| Ok(snapshot.entries_for(habit_id)))
    }

    fn save_entry(&self, entry: &Entry) -> Result<()> {
        self.with_snapshot(|snapshot| {
            ensure_owner(snapshot, entry.habit_id)?;
            snapshot.apply(Record::Entry(entry.clone()));
            Ok(())
        })
    }

    fn update_entry(
        &self,
        habit_id: HabitId,
        build: &mut dyn FnMut(Vec<Entry>) -> Entry,
    ) -> Result<Entry> {
        self.with_snapshot(|snapshot| {
            ensure_owner(snapshot, habit_id)?;
            let entry = build(snapshot.entries_for(habit_id));
            ensure_owner(snapshot, entry.habit_id)?;
            snapshot.apply(Record::Entry(entry.clone()));
            Ok(entry)
        })
    }
}

//! Entry ledger: one entry per habit per calendar day.
//!
//! The ledger is the only path that creates or overwrites entries. It keys
//! entries by the calendar day of their date, as defined by the [`Calendar`]
//! fixed at construction, and persists every change through a
//! [`HabitStore`] before reporting success.
//!
//! Writes to one habit are serialized by a per-habit mutex, and the
//! find-then-write itself runs inside [`HabitStore::update_entry`], which
//! the file store guards with an exclusive lock shared by every process.
//! Reads take no writer lock and see whatever the store holds.

use crate::{Calendar, Entry, Habit, HabitId, HabitStore, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Day-keyed access to a habit's entries
#[derive(Debug)]
pub struct EntryLedger<S> {
    store: S,
    calendar: Calendar,
    writers: Mutex<HashMap<HabitId, Arc<Mutex<()>>>>,
}

impl<S: HabitStore> EntryLedger<S> {
    pub fn new(store: S, calendar: Calendar) -> Self {
        Self {
            store,
            calendar,
            writers: Mutex::new(HashMap::new()),
        }
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn writer_lock(&self, habit_id: HabitId) -> Arc<Mutex<()>> {
        // The map and the per-habit mutexes guard no data of their own, so a
        // poisoned lock is still safe to reuse.
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(writers.entry(habit_id).or_default())
    }

    /// Record the outcome for the day containing `date`.
    ///
    /// Overwrites the existing entry for that day in place (keeping its id
    /// and date) or creates a new one dated at the start of the day. Craving
    /// level and note are replaced as given, so `None` clears them. Returns
    /// the entry as persisted; on error nothing was committed.
    pub fn upsert_entry(
        &self,
        habit: &Habit,
        date: DateTime<Utc>,
        is_success: bool,
        craving_level: Option<u8>,
        note: Option<String>,
    ) -> Result<Entry> {
        let day = self.calendar.day_of(date);
        let (start, end) = self.calendar.day_bounds(day);

        let writer = self.writer_lock(habit.id);
        let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let entry = self.store.update_entry(habit.id, &mut |entries| {
            match entries
                .into_iter()
                .filter(|entry| entry.date >= start && entry.date < end)
                .min_by_key(|entry| entry.date)
            {
                Some(mut entry) => {
                    entry.is_success = is_success;
                    entry.craving_level = craving_level;
                    entry.note = note.clone();
                    entry.updated_at = now;
                    entry
                }
                None => Entry {
                    id: Uuid::new_v4(),
                    habit_id: habit.id,
                    date: start,
                    is_success,
                    craving_level,
                    note: note.clone(),
                    updated_at: now,
                },
            }
        })?;

        tracing::debug!(
            "Upserted entry {} for habit '{}' on {} (success: {})",
            entry.id,
            habit.name,
            day,
            is_success
        );
        Ok(entry)
    }

    /// The entry for the day containing `date`, if one was recorded
    pub fn fetch_entry(&self, habit: &Habit, date: DateTime<Utc>) -> Result<Option<Entry>> {
        let (start, end) = self.calendar.day_bounds(self.calendar.day_of(date));
        Ok(self
            .store
            .load_entries(habit.id)?
            .into_iter()
            .filter(|entry| entry.date >= start && entry.date < end)
            .min_by_key(|entry| entry.date))
    }

    /// Entries whose day lies within the inclusive bounds, oldest first.
    ///
    /// Either bound may be omitted. More than one entry per day is returned
    /// as-is if the store holds them.
    pub fn fetch_entries(
        &self,
        habit: &Habit,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Entry>> {
        let from_day: Option<NaiveDate> = from.map(|d| self.calendar.day_of(d));
        let to_day: Option<NaiveDate> = to.map(|d| self.calendar.day_of(d));

        let mut entries: Vec<Entry> = self
            .store
            .load_entries(habit.id)?
            .into_iter()
            .filter(|entry| {
                let day = self.calendar.day_of(entry.date);
                from_day.map_or(true, |from| day >= from) && to_day.map_or(true, |to| day <= to)
            })
            .collect();
        entries.sort_by_key(|entry| entry.date);
        Ok(entries)
    }

    /// Delete the habit together with all of its entries
    pub fn delete_habit(&self, habit: &Habit) -> Result<usize> {
        let writer = self.writer_lock(habit.id);
        let removed = {
            let _guard = writer.lock().unwrap_or_else(PoisonError::into_inner);
            self.store.delete_habit(habit.id)?
        };
        self.writers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&habit.id);
        Ok(removed)
    }
}

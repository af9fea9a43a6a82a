//! Core domain types for habit tracking.
//!
//! A [`Habit`] owns a set of daily [`Entry`] records. Entries point back at
//! their habit through `habit_id`; the store removes them when the habit goes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a habit
pub type HabitId = Uuid;

/// Stable identifier of an entry
pub type EntryId = Uuid;

/// Whether the habit is something to do more of or less of.
///
/// Purely informational: streak arithmetic only looks at `is_success`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum HabitMode {
    Positive,
    #[default]
    Negative,
}

impl fmt::Display for HabitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HabitMode::Positive => f.write_str("positive"),
            HabitMode::Negative => f.write_str("negative"),
        }
    }
}

impl FromStr for HabitMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(HabitMode::Positive),
            "negative" => Ok(HabitMode::Negative),
            other => Err(crate::Error::Config(format!(
                "Unknown habit mode '{}' (expected positive or negative)",
                other
            ))),
        }
    }
}

/// A tracked behaviour with one recorded outcome per day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub mode: HabitMode,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    /// Build a new habit, rejecting blank names
    pub fn new(name: &str, mode: HabitMode) -> crate::Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(crate::Error::InvalidHabit("name must not be empty".into()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            mode,
            created_at: Utc::now(),
        })
    }
}

/// One day's recorded outcome for a habit
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: EntryId,
    pub habit_id: HabitId,
    /// Only the calendar day is significant; new entries hold the start of day
    pub date: DateTime<Utc>,
    pub is_success: bool,
    pub craving_level: Option<u8>,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

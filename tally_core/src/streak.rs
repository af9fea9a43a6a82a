//! Streak derivation from entry history.
//!
//! A streak is a run of consecutive calendar days that each have a
//! successful entry. Both metrics work on the set of unique successful days,
//! so several successful entries landing on one day count once.

use crate::{Calendar, Entry};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Current and longest streak, computed together
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
}

/// Stateless streak computations keyed by the given calendar
#[derive(Clone, Copy, Debug, Default)]
pub struct StreakCalculator {
    calendar: Calendar,
}

impl StreakCalculator {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }

    /// Unique calendar days that have at least one successful entry
    pub fn normalized_successful_days<'a, I>(&self, entries: I) -> BTreeSet<NaiveDate>
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        entries
            .into_iter()
            .filter(|entry| entry.is_success)
            .map(|entry| self.calendar.day_of(entry.date))
            .collect()
    }

    /// Length of the run ending at `today`, or 0 if `today` itself is not a
    /// successful day
    pub fn current_streak<'a, I>(&self, entries: I, today: NaiveDate) -> u32
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        let days = self.normalized_successful_days(entries);
        walk_back(&days, today)
    }

    /// Longest run anywhere in the history
    pub fn longest_streak<'a, I>(&self, entries: I) -> u32
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        let days = self.normalized_successful_days(entries);
        longest_run(&days)
    }

    /// Both metrics from a single pass over the entries
    pub fn summarize<'a, I>(&self, entries: I, today: NaiveDate) -> StreakSummary
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        let days = self.normalized_successful_days(entries);
        StreakSummary {
            current: walk_back(&days, today),
            longest: longest_run(&days),
        }
    }
}

/// Stops at the first missing day, so cost is bounded by the streak length
fn walk_back(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut count = 0;
    let mut cursor = Some(today);
    while let Some(day) = cursor {
        if !days.contains(&day) {
            break;
        }
        count += 1;
        cursor = day.pred_opt();
    }
    count
}

/// `days` iterates in ascending order
fn longest_run(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest: u32 = 0;
    let mut run: u32 = 0;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }

    longest
}

//! Calendar used to turn instants into calendar days.
//!
//! Every day-keyed comparison in the ledger and the streak calculator goes
//! through a [`Calendar`] supplied by the caller. Nothing in the core reads
//! the system timezone implicitly.

use crate::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// Timezone rule that defines where one day ends and the next begins
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Calendar {
    /// Days roll over at UTC midnight
    Utc,
    /// Days roll over at midnight in the system timezone
    #[default]
    Local,
    /// Days roll over at midnight of a fixed UTC offset
    Fixed(FixedOffset),
}

impl Calendar {
    /// Calendar day that contains `instant`
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Calendar::Utc => instant.date_naive(),
            Calendar::Local => instant.with_timezone(&Local).date_naive(),
            Calendar::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    /// First instant of `day`
    pub fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);
        match self {
            Calendar::Utc => Utc.from_utc_datetime(&midnight),
            Calendar::Fixed(offset) => {
                let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
                Utc.from_utc_datetime(&(midnight - shift))
            }
            Calendar::Local => {
                first_instant(&Local, day).unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
            }
        }
    }

    /// Half-open instant range `[start, end)` covering `day`
    pub fn day_bounds(&self, day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_of_day(day);
        let end = day
            .succ_opt()
            .map(|next| self.start_of_day(next))
            .unwrap_or(start + Duration::days(1));
        (start, end)
    }

    /// Today's date, read from the wall clock once
    pub fn today(&self) -> NaiveDate {
        self.day_of(Utc::now())
    }
}

/// Earliest instant of `day` in `tz`. Midnight can be skipped by a DST jump,
/// in which case the day starts at the first hour that exists.
fn first_instant<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Option<DateTime<Utc>> {
    (0..24)
        .filter_map(|hour| day.and_hms_opt(hour, 0, 0))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Utc => f.write_str("utc"),
            Calendar::Local => f.write_str("local"),
            Calendar::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl FromStr for Calendar {
    type Err = Error;

    /// Accepts `local`, `utc`, or an offset such as `+09:00` / `-0530`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "local" => return Ok(Calendar::Local),
            "utc" | "z" => return Ok(Calendar::Utc),
            _ => {}
        }

        let invalid = || Error::Config(format!("Invalid timezone '{}'", s));

        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Calendar::Fixed)
            .ok_or_else(invalid)
    }
}

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tally_core::*;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Daily habit tracker with streaks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Habit to track (defaults to the configured habit)
    #[arg(long, global = true)]
    habit: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the outcome for today or a given day
    Log {
        /// The day went well
        #[arg(long, conflicts_with = "fail", required_unless_present = "fail")]
        success: bool,

        /// The day did not go well
        #[arg(long)]
        fail: bool,

        /// Day to record (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Craving intensity from 0 to 10
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=10))]
        craving: Option<u8>,

        /// Free-text note for the day
        #[arg(long)]
        note: Option<String>,
    },

    /// Show current and longest streak (default)
    Status {
        /// Reference day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// List recorded days
    History {
        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Export the habit's history as CSV
    Export {
        /// Output file
        #[arg(long)]
        out: PathBuf,
    },

    /// Rewrite the log without superseded records
    Compact,

    /// Delete the habit and all of its entries
    Reset {
        /// Confirm deletion
        #[arg(long, required = true)]
        yes: bool,
    },
}

/// Everything `status` prints, gathered before rendering
struct StatusView {
    habit_name: String,
    mode: HabitMode,
    today: NaiveDate,
    today_outcome: Option<bool>,
    streaks: StreakSummary,
    days_recorded: usize,
}

fn main() -> Result<()> {
    // Initialize logging
    tally_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let calendar = config.calendar()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let habit_name = cli
        .habit
        .unwrap_or_else(|| config.habit.default_name.clone());

    let ledger = EntryLedger::new(JsonlStore::in_dir(&data_dir), calendar);

    match cli.command.unwrap_or(Commands::Status { today: None }) {
        Commands::Log {
            success,
            fail: _,
            date,
            craving,
            note,
        } => {
            let habit = bootstrap_habit(&ledger, &habit_name, &config)?;
            cmd_log(&ledger, &habit, success, date, craving, note)
        }
        Commands::Status { today } => {
            let habit = bootstrap_habit(&ledger, &habit_name, &config)?;
            cmd_status(&ledger, &habit, today)
        }
        Commands::History { from, to } => {
            let habit = bootstrap_habit(&ledger, &habit_name, &config)?;
            cmd_history(&ledger, &habit, from, to)
        }
        Commands::Export { out } => {
            let habit = bootstrap_habit(&ledger, &habit_name, &config)?;
            cmd_export(&ledger, &habit, &out)
        }
        Commands::Compact => cmd_compact(ledger.store()),
        Commands::Reset { yes: _ } => cmd_reset(&ledger, &habit_name),
    }
}

/// Fetch the habit by name, creating it with the configured mode on first use
fn bootstrap_habit(
    ledger: &EntryLedger<JsonlStore>,
    name: &str,
    config: &Config,
) -> Result<Habit> {
    ledger
        .store()
        .get_or_create_habit(name, config.habit.default_mode)
}

fn cmd_log(
    ledger: &EntryLedger<JsonlStore>,
    habit: &Habit,
    success: bool,
    date: Option<NaiveDate>,
    craving: Option<u8>,
    note: Option<String>,
) -> Result<()> {
    let calendar = ledger.calendar();
    let today = calendar.today();
    let day = date.unwrap_or(today);
    let note = note.filter(|n| !n.trim().is_empty());

    ledger.upsert_entry(habit, calendar.start_of_day(day), success, craving, note)?;

    let outcome = if success { "success" } else { "slip" };
    println!("✓ Logged {} for '{}' on {}", outcome, habit.name, day);

    let entries = ledger.fetch_entries(habit, None, None)?;
    let streaks = StreakCalculator::new(calendar).summarize(&entries, today);
    println!("  Current streak: {}", days(streaks.current));

    Ok(())
}

fn cmd_status(
    ledger: &EntryLedger<JsonlStore>,
    habit: &Habit,
    today: Option<NaiveDate>,
) -> Result<()> {
    let calendar = ledger.calendar();
    let today = today.unwrap_or_else(|| calendar.today());

    let entries = ledger.fetch_entries(habit, None, None)?;
    let today_outcome = ledger
        .fetch_entry(habit, calendar.start_of_day(today))?
        .map(|entry| entry.is_success);

    let view = StatusView {
        habit_name: habit.name.clone(),
        mode: habit.mode,
        today,
        today_outcome,
        streaks: StreakCalculator::new(calendar).summarize(&entries, today),
        days_recorded: entries.len(),
    };
    display_status(&view);
    Ok(())
}

fn cmd_history(
    ledger: &EntryLedger<JsonlStore>,
    habit: &Habit,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let calendar = ledger.calendar();
    let entries = ledger.fetch_entries(
        habit,
        from.map(|d| calendar.start_of_day(d)),
        to.map(|d| calendar.start_of_day(d)),
    )?;

    if entries.is_empty() {
        println!("No entries recorded for '{}'.", habit.name);
        return Ok(());
    }

    for entry in &entries {
        let mark = if entry.is_success { "✓" } else { "✗" };
        let mut line = format!("{}  {}", calendar.day_of(entry.date), mark);
        if let Some(level) = entry.craving_level {
            line.push_str(&format!("  craving {}", level));
        }
        if let Some(ref note) = entry.note {
            line.push_str(&format!("  {}", note));
        }
        println!("{}", line);
    }

    Ok(())
}

fn cmd_export(ledger: &EntryLedger<JsonlStore>, habit: &Habit, out: &Path) -> Result<()> {
    let entries = ledger.fetch_entries(habit, None, None)?;
    let count = entries_to_csv(&entries, &ledger.calendar(), out)?;

    println!("✓ Exported {} entries to CSV", count);
    println!("  CSV: {}", out.display());
    Ok(())
}

fn cmd_compact(store: &JsonlStore) -> Result<()> {
    if !store.path().exists() {
        println!("No log file found - nothing to compact.");
        return Ok(());
    }

    let dropped = store.compact()?;
    println!("✓ Compacted log, dropped {} superseded records", dropped);
    Ok(())
}

fn cmd_reset(ledger: &EntryLedger<JsonlStore>, habit_name: &str) -> Result<()> {
    let Some(habit) = ledger.store().find_habit(habit_name)? else {
        println!("No habit named '{}' - nothing to reset.", habit_name);
        return Ok(());
    };

    let removed = ledger.delete_habit(&habit)?;
    println!("✓ Deleted '{}' and {} entries", habit.name, removed);
    Ok(())
}

fn display_status(view: &StatusView) {
    println!();
    println!("  {} ({})", view.habit_name, view.mode);
    println!();

    let today = match view.today_outcome {
        Some(true) => "✓ success",
        Some(false) => "✗ slip",
        None => "not logged yet",
    };
    println!("  Today ({}): {}", view.today, today);
    println!("  Current streak: {}", days(view.streaks.current));
    println!("  Longest streak: {}", days(view.streaks.longest));
    println!("  Days recorded:  {}", view.days_recorded);
    println!();
}

fn days(n: u32) -> String {
    if n == 1 {
        "1 day".into()
    } else {
        format!("{} days", n)
    }
}

use anyhow::{bail, Context, Result};
use cakewait_core::{
    format_friendly, local_today, parse_birth_date, sort_by_upcoming, MonthGrid, RecordDraft,
    RecordError, RecordStore,
};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod delivery;
mod ledger;
mod notify;
mod state;
mod store;
mod trigger;

use crate::ledger::SentLedger;
use crate::store::JsonFileStore;
use crate::trigger::CheckOptions;

#[derive(Parser, Debug)]
#[command(
    name = "cakewait",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CAKEWAIT_BUILD_REV"), ")"),
    about = "Birthday reminders: upcoming list, month view, and on-the-day / tomorrow / next-week alerts"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a new birthday
    Add {
        #[arg(long)]
        name: String,

        /// Birth date as YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// Friend, Family, Partner, Work, ...
        #[arg(long)]
        relationship: Option<String>,

        #[arg(long)]
        emoji: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Keep this birthday in the list but never send reminders for it
        #[arg(long, default_value_t = false)]
        no_notify: bool,
    },

    /// Edit a birthday in place (unspecified fields keep their value)
    Edit {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        relationship: Option<String>,

        #[arg(long)]
        emoji: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Turn reminders on or off
        #[arg(long)]
        notify: Option<bool>,
    },

    /// Delete a birthday
    Remove { id: String },

    /// List birthdays, soonest first
    List {
        /// Override today's date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_today)]
        today: Option<NaiveDate>,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Show the next upcoming birthday
    Next {
        #[arg(long, value_parser = parse_today)]
        today: Option<NaiveDate>,
    },

    /// Month view of birthdays
    Calendar {
        /// Month number 1-12 (default: current month)
        #[arg(long)]
        month: Option<u32>,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long, value_parser = parse_today)]
        today: Option<NaiveDate>,
    },

    /// Evaluate reminders once and deliver matches (for cron / timers)
    Check {
        #[arg(long, value_parser = parse_today)]
        today: Option<NaiveDate>,

        /// Print what would be sent without delivering
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Delivery channel(s), overriding config (repeatable)
        #[arg(long = "channel")]
        channels: Vec<String>,
    },

    /// Keep running and re-check periodically (Enter forces a check)
    Watch {
        #[arg(long, value_parser = parse_today)]
        today: Option<NaiveDate>,

        #[arg(long = "channel")]
        channels: Vec<String>,
    },

    /// Ask each configured delivery channel for authorization
    Authorize,

    /// Manage ~/.cakewait/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config.toml if none exists
    Init,
    /// Print the effective configuration
    Show,
}

fn parse_today(s: &str) -> Result<NaiveDate, String> {
    parse_birth_date(s).map_err(|e| e.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CAKEWAIT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_store() -> Result<JsonFileStore> {
    Ok(JsonFileStore::open(state::birthdays_path()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Add {
            name,
            date,
            relationship,
            emoji,
            notes,
            no_notify,
        } => {
            let draft = RecordDraft {
                name,
                birth_date: date,
                notification_enabled: !no_notify,
                relationship,
                emoji,
                notes,
            };
            let record = draft.into_record()?;
            let mut store = open_store()?;
            store.upsert(record.clone())?;
            info!(id = %record.id, "birthday added");
            println!("Added {} ({}) id={}", record.name, record.birth_date, record.id);
        }

        Command::Edit {
            id,
            name,
            date,
            relationship,
            emoji,
            notes,
            notify,
        } => {
            let mut store = open_store()?;
            let mut record = store
                .get(&id)?
                .ok_or_else(|| RecordError::NotFound(id.clone()))?;

            let mut draft = RecordDraft::from_record(&record);
            if let Some(v) = name {
                draft.name = v;
            }
            if let Some(v) = date {
                draft.birth_date = v;
            }
            if let Some(v) = relationship {
                draft.relationship = Some(v);
            }
            if let Some(v) = emoji {
                draft.emoji = Some(v);
            }
            if let Some(v) = notes {
                draft.notes = Some(v);
            }
            if let Some(v) = notify {
                draft.notification_enabled = v;
            }

            draft.apply_to(&mut record)?;
            store.upsert(record.clone())?;
            println!("Updated {} ({})", record.name, record.birth_date);
        }

        Command::Remove { id } => {
            let mut store = open_store()?;
            if !store.remove(&id)? {
                return Err(RecordError::NotFound(id).into());
            }

            let ledger_path = state::sent_keys_path()?;
            if ledger_path.exists() {
                let forgotten = SentLedger::load(&ledger_path)?.forget(&id)?;
                info!(%id, forgotten, "cleared sent reminders for removed birthday");
            }
            println!("Removed {id}");
        }

        Command::List { today, limit } => {
            list(today.unwrap_or_else(local_today), limit)?;
        }

        Command::Next { today } => {
            next(today.unwrap_or_else(local_today))?;
        }

        Command::Calendar { month, year, today } => {
            let today = today.unwrap_or_else(local_today);
            calendar(year.unwrap_or(today.year()), month.unwrap_or(today.month()))?;
        }

        Command::Check {
            today,
            dry_run,
            channels,
        } => {
            let cfg = config::load_config()?;
            let opts = CheckOptions {
                today,
                dry_run,
                channels: non_empty(channels),
            };
            let report = trigger::run_check(&cfg, &opts).await?;
            trigger::print_report(&report);
        }

        Command::Watch { today, channels } => {
            let cfg = config::load_config()?;
            let opts = CheckOptions {
                today,
                dry_run: false,
                channels: non_empty(channels),
            };
            trigger::watch(cfg, opts).await?;
        }

        Command::Authorize => {
            let cfg = config::load_config()?;
            let channels = delivery::build_channels(&cfg.reminders.channels)?;
            for ch in &channels {
                let auth = ch.request_authorization().await;
                println!("- {}: {:?}", ch.name(), auth);
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
    }

    Ok(())
}

fn non_empty(v: Vec<String>) -> Option<Vec<String>> {
    if v.is_empty() { None } else { Some(v) }
}

fn list(today: NaiveDate, limit: usize) -> Result<()> {
    let store = open_store()?;
    let records = store.all_records().context("loading birthdays")?;
    if records.is_empty() {
        println!("No birthdays yet. Add one: cakewait add --name <name> --date YYYY-MM-DD");
        return Ok(());
    }

    let rows = sort_by_upcoming(&records, today, None);
    println!("Upcoming birthdays (as of {})\n", today.format("%Y-%m-%d"));

    for row in rows.iter().take(limit) {
        let when = match row.days_until {
            0 => "TODAY".to_string(),
            1 => "tomorrow".to_string(),
            n => format!("in {n} days"),
        };
        let emoji = row.record.emoji.as_deref().unwrap_or("🎂");
        let muted = if row.record.notification_enabled { "" } else { " (muted)" };
        println!(
            "{} {:<20} {:<7} {:<12} turns {:<3} {}{}",
            emoji,
            row.record.name,
            format_friendly(row.next_date),
            when,
            row.occurrence_age,
            row.record.id,
            muted
        );
    }

    let skipped = records.len() - rows.len();
    if skipped > 0 {
        println!("\n{skipped} record(s) skipped: invalid birth date (fix with `cakewait edit <id> --date YYYY-MM-DD`)");
    }
    Ok(())
}

fn next(today: NaiveDate) -> Result<()> {
    let records = open_store()?.all_records()?;
    let rows = sort_by_upcoming(&records, today, None);
    let Some(first) = rows.first() else {
        println!("No birthdays yet.");
        return Ok(());
    };

    if first.is_today {
        println!(
            "🎉 {} turns {} today!",
            first.record.name, first.occurrence_age
        );
    } else {
        println!(
            "Next up: {} on {} ({} days), turning {}",
            first.record.name,
            format_friendly(first.next_date),
            first.days_until,
            first.next_age
        );
    }
    Ok(())
}

fn calendar(year: i32, month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        bail!("month must be 1-12, got {month}");
    }
    let records = open_store()?.all_records()?;
    let grid = MonthGrid::build(&records, year, month)?;

    let title = NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_default();
    println!("{title}");
    println!(" Mo  Tu  We  Th  Fr  Sa  Su");
    for week in grid.weeks() {
        let cells: Vec<String> = week
            .iter()
            .map(|cell| match cell {
                Some(day) if grid.by_day.contains_key(day) => format!("{day:>2}*"),
                Some(day) => format!("{day:>2} "),
                None => "   ".to_string(),
            })
            .collect();
        println!(" {}", cells.join(" "));
    }

    println!();
    if grid.total() == 0 {
        println!("No birthdays this month.");
    }
    for (day, people) in &grid.by_day {
        for r in people {
            println!("{:>2}  {} {}", day, r.emoji.as_deref().unwrap_or("🎂"), r.name);
        }
    }
    Ok(())
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clubready::booking::{book_matches, BookingSession};
use clubready::calendar::{match_events, permitted_summaries, CalendarEvent, EventsResponse, MatchOptions};
use clubready::config::{locate_config_dir, Config, ConfigLayer, CONFIG_FILE_NAME};
use clubready::schedule::cache::{read_cache, write_cache, TABLE_CACHE_NAME};
use clubready::schedule::{parse_class_table, CacheError, ClassRecord, ParseContext};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "clubready", version, about)]
struct Cli {
    /// Directory holding config.json and the class table cache
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a saved schedule page and print its classes as JSON
    Parse {
        /// Page source of the weekly class schedule
        #[arg(long)]
        schedule: PathBuf,

        /// Also store the classes in the class table cache
        #[arg(long)]
        write_cache: bool,
    },
    /// Match calendar events against the class table and print what would be booked
    Plan {
        /// Events list response (or bare array of events) as JSON
        #[arg(long)]
        events: PathBuf,

        /// Page source to parse when there is no usable cache
        #[arg(long)]
        schedule: Option<PathBuf>,

        /// Run every step except the booking itself
        #[arg(long)]
        dry_run: bool,
    },
}

/// Stands in for the browser session: reports the control it would click.
struct PrintSession;

impl BookingSession for PrintSession {
    fn book(&mut self, class: &ClassRecord, waitlist: bool) -> Result<()> {
        let token = class
            .booking_id
            .as_deref()
            .context("class has no booking control")?;
        println!(
            "  -> {} via {token}",
            if waitlist { "join waitlist" } else { "book" }
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let env_layer = ConfigLayer::from_env(std::env::vars())?;
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let explicit_dir = cli.config_dir.as_deref().or(env_layer.config_dir.as_deref());
    let config_dir = locate_config_dir(explicit_dir, home.as_deref())?;

    let file_layer = match &config_dir {
        Some(dir) => ConfigLayer::load_file(&dir.join(CONFIG_FILE_NAME))?,
        None => ConfigLayer::default(),
    };
    let config = Config::resolve(&env_layer, &file_layer, &Config::default())?;
    info!(
        bookable_range = config.bookable_range,
        max_results = config.max_results,
        timezone = %config.timezone,
        "Resolved configuration"
    );

    let cache_path = config_dir.map(|dir| dir.join(TABLE_CACHE_NAME));

    match cli.command {
        Command::Parse {
            schedule,
            write_cache: store,
        } => {
            let class_table = parse_schedule_file(&schedule, &config)?;
            if store {
                let path = cache_path.context("no config directory to write the cache into")?;
                write_cache(&path, &class_table)?;
            }
            println!("{}", serde_json::to_string_pretty(&class_table)?);
        }
        Command::Plan {
            events,
            schedule,
            dry_run,
        } => {
            let class_table = load_class_table(cache_path.as_deref(), schedule.as_deref(), &config)?;
            let mut events = load_events(&events)?;
            events.truncate(config.max_results);

            let options = MatchOptions::new(chrono::Utc::now(), config.bookable_range)
                .with_permitted(permitted_summaries(&class_table));
            let outcome = match_events(&events, &class_table, &options);

            let mut session = PrintSession;
            for report in book_matches(&outcome, Some(&mut session), dry_run) {
                let start = report
                    .class
                    .start_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                println!("{} @ {start}: {}", report.summary, report.decision);
                if let Some(error) = report.error {
                    println!("  !! {error}");
                }
            }
        }
    }

    Ok(())
}

fn parse_schedule_file(path: &Path, config: &Config) -> Result<Vec<ClassRecord>> {
    let html = fs::read_to_string(path)
        .with_context(|| format!("could not read schedule page {}", path.display()))?;
    let class_table = parse_class_table(&html, &ParseContext::new(config.timezone))
        .with_context(|| format!("schedule page {} has an unexpected layout", path.display()))?;
    Ok(class_table)
}

/// Uses the cached class table when there is one, else parses the page.
///
/// `started`/`ended` of cached classes are recomputed for the current time.
fn load_class_table(
    cache_path: Option<&Path>,
    schedule: Option<&Path>,
    config: &Config,
) -> Result<Vec<ClassRecord>> {
    if let Some(path) = cache_path {
        match read_cache(path) {
            Ok(Some(mut class_table)) => {
                let now = chrono::Utc::now();
                for class in &mut class_table {
                    class.refresh_elapsed(now);
                }
                return Ok(class_table);
            }
            Ok(None) => {}
            Err(e @ CacheError::Malformed(_)) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable class table cache")
            }
            Err(e) => return Err(e.into()),
        }
    }

    match schedule {
        Some(page) => parse_schedule_file(page, config),
        None => bail!("no class table cache and no --schedule page to parse"),
    }
}

fn load_events(path: &Path) -> Result<Vec<CalendarEvent>> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("could not read events file {}", path.display()))?;
    if let Ok(response) = serde_json::from_str::<EventsResponse>(&body) {
        return Ok(response.items);
    }
    serde_json::from_str(&body)
        .with_context(|| format!("events file {} is not an events list", path.display()))
}

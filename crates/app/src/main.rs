use std::fmt;

use chrono::Utc;
use serde_json::{Value, json};

use medrep_core::Clock;
use medrep_core::model::{DoctorId, PresentationId, SessionId, SlideId, SlideTiming};
use services::{AnalyticsService, CatalogService, SessionLoopService};
use storage::repository::Storage;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidStorePath { raw: String },
    InvalidDbUrl { raw: String },
    InvalidTiming { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidStorePath { raw } => write!(f, "invalid --store value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidTiming { raw } => {
                write!(f, "invalid --timing value (expected <slideId>=<ms>): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Dashboard,
    Analytics,
    StartPage,
    Start,
    End,
    Presentation,
    Upload,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "dashboard" => Some(Self::Dashboard),
            "analytics" => Some(Self::Analytics),
            "start-page" => Some(Self::StartPage),
            "start" => Some(Self::Start),
            "end" => Some(Self::End),
            "presentation" => Some(Self::Presentation),
            "upload" => Some(Self::Upload),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Backend {
    JsonFile(String),
    Sqlite(String),
    Memory,
}

#[derive(Debug, Clone)]
struct Args {
    command: Command,
    backend: Backend,
    doctor: Option<String>,
    presentation: Option<String>,
    session: Option<String>,
    timings: Vec<SlideTiming>,
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_timing(raw: &str) -> Result<SlideTiming, ArgsError> {
    let (slide_id, ms) = raw.split_once('=').ok_or_else(|| ArgsError::InvalidTiming {
        raw: raw.to_owned(),
    })?;
    let time_spent_ms: u64 = ms.parse().map_err(|_| ArgsError::InvalidTiming {
        raw: raw.to_owned(),
    })?;
    if slide_id.is_empty() {
        return Err(ArgsError::InvalidTiming {
            raw: raw.to_owned(),
        });
    }
    Ok(SlideTiming {
        slide_id: SlideId::new(slide_id),
        time_spent_ms,
    })
}

impl Args {
    fn parse(mut argv: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let command = match argv.next() {
            None => Command::Dashboard,
            Some(first) => match first.as_str() {
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => Command::from_arg(other)
                    .ok_or_else(|| ArgsError::UnknownCommand(other.to_owned()))?,
            },
        };

        let mut backend = match std::env::var("MEDREP_DB_URL") {
            Ok(url) if !url.trim().is_empty() => Backend::Sqlite(url),
            _ => Backend::JsonFile(
                std::env::var("MEDREP_STORE").unwrap_or_else(|_| "data/database.json".into()),
            ),
        };
        let mut doctor = None;
        let mut presentation = None;
        let mut session = None;
        let mut timings = Vec::new();
        let mut id = None;
        let mut title = None;
        let mut description = None;

        while let Some(arg) = argv.next() {
            match arg.as_str() {
                "--store" => {
                    let value = require_value(&mut argv, "--store")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidStorePath { raw: value });
                    }
                    backend = Backend::JsonFile(value);
                }
                "--db" => {
                    let value = require_value(&mut argv, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    backend = Backend::Sqlite(value);
                }
                "--memory" => backend = Backend::Memory,
                "--doctor" => doctor = Some(require_value(&mut argv, "--doctor")?),
                "--presentation" => {
                    presentation = Some(require_value(&mut argv, "--presentation")?);
                }
                "--session" => session = Some(require_value(&mut argv, "--session")?),
                "--timing" => {
                    let value = require_value(&mut argv, "--timing")?;
                    timings.push(parse_timing(&value)?);
                }
                "--id" => id = Some(require_value(&mut argv, "--id")?),
                "--title" => title = Some(require_value(&mut argv, "--title")?),
                "--description" => description = Some(require_value(&mut argv, "--description")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            command,
            backend,
            doctor,
            presentation,
            session,
            timings,
            id,
            title,
            description,
        })
    }

    fn required(value: Option<String>, flag: &'static str) -> Result<String, ArgsError> {
        value.ok_or(ArgsError::MissingFlag { flag })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  dashboard                      Doctors, presentations and recent-session count");
    eprintln!("  analytics                      Full engagement analytics payload");
    eprintln!("  start-page                     Doctors and presentations for session setup");
    eprintln!("  start --doctor <id> --presentation <id>");
    eprintln!("                                 Start a session; prints its id");
    eprintln!("  end --session <id> [--timing <slideId>=<ms>]...");
    eprintln!("                                 End a session with per-slide timings");
    eprintln!("  presentation --id <id>         A presentation and its ordered slides");
    eprintln!("  upload --title <t> [--description <d>]");
    eprintln!("                                 Create a presentation with a generated outline");
    eprintln!("  seed                           Write the initial data set to the store");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --store <path>     JSON store document (default: data/database.json)");
    eprintln!("  --db <sqlite_url>  Use a SQLite database instead of the JSON store");
    eprintln!("  --memory           Use a seeded in-memory store (discarded on exit)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MEDREP_STORE, MEDREP_DB_URL, RUST_LOG");
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .unwrap_or(db_url);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn open_storage(backend: &Backend) -> Result<Storage, Box<dyn std::error::Error>> {
    match backend {
        Backend::JsonFile(path) => Ok(Storage::json_file(path)?),
        Backend::Sqlite(url) => {
            prepare_sqlite_file(url)?;
            let storage = Storage::sqlite(url).await?;
            Ok(storage)
        }
        Backend::Memory => Ok(Storage::in_memory_seeded(Utc::now())),
    }
}

async fn dispatch(args: Args) -> Result<Value, Box<dyn std::error::Error>> {
    let storage = open_storage(&args.backend).await?;
    let clock = Clock::default_clock();

    match args.command {
        Command::Dashboard => {
            let data = AnalyticsService::from_storage(&storage).dashboard().await?;
            Ok(serde_json::to_value(data)?)
        }
        Command::Analytics => {
            let data = AnalyticsService::from_storage(&storage).analytics().await?;
            Ok(serde_json::to_value(data)?)
        }
        Command::StartPage => {
            let data = AnalyticsService::from_storage(&storage).start_page().await?;
            Ok(serde_json::to_value(data)?)
        }
        Command::Start => {
            let doctor = DoctorId::new(Args::required(args.doctor, "--doctor")?);
            let presentation =
                PresentationId::new(Args::required(args.presentation, "--presentation")?);
            let service = SessionLoopService::from_storage(clock, &storage);
            let started = service.start_session(&doctor, &presentation).await?;
            Ok(json!({
                "success": true,
                "sessionId": started.session.id().as_str(),
            }))
        }
        Command::End => {
            let session = SessionId::new(Args::required(args.session, "--session")?);
            let service = SessionLoopService::from_storage(clock, &storage);
            let ended = service.end_with_timings(&session, &args.timings).await?;
            Ok(json!({
                "success": true,
                "session": storage::repository::SessionRecord::from_domain(&ended),
            }))
        }
        Command::Presentation => {
            let id = PresentationId::new(Args::required(args.id, "--id")?);
            let service = CatalogService::from_storage(clock, &storage);
            let data = service.presentation_data(&id).await?;
            Ok(json!({
                "success": true,
                "presentation": data.presentation,
                "slides": data.slides,
            }))
        }
        Command::Upload => {
            let title = Args::required(args.title, "--title")?;
            let service = CatalogService::from_storage(clock, &storage);
            let data = service.create_presentation(&title, args.description).await?;
            Ok(json!({
                "success": true,
                "presentationId": data.presentation.id.as_str(),
                "slides": data.slides.len(),
            }))
        }
        Command::Seed => {
            storage::seed::apply(&storage, clock.now()).await?;
            Ok(json!({
                "success": true,
                "message": "initial data seeded",
            }))
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    match dispatch(args).await {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Err(err) => {
            // Every runtime failure folds into the error envelope.
            let envelope = json!({
                "success": false,
                "message": err.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Err(err)
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(err) = run().await {
        log::debug!("command failed: {err}");
        std::process::exit(2);
    }
}

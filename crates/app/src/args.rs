use std::fmt;
use std::path::PathBuf;

use services::{DEFAULT_QUESTIONS_LOCATION, EXPORT_FILE_NAME};
use study_core::model::{ANY, EntityKind};

pub const DEFAULT_DB_URL: &str = "sqlite://study.sqlite3";

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    UnknownEntity { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing command"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::UnknownEntity { raw } => write!(f, "unknown entity: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Login { username: String },
    Logout,
    Export { out: PathBuf },
    Import { file: PathBuf },
    Reset { entity: EntityKind },
    Clear,
    Practice {
        chapter: String,
        difficulty: String,
        question_type: String,
    },
    Exam {
        chapter: String,
        count: Option<u32>,
        minutes: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub db_url: String,
    pub questions: String,
    pub command: Command,
}

/// Environment defaults, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct EnvDefaults {
    pub db_url: Option<String>,
    pub questions: Option<String>,
}

impl EnvDefaults {
    pub fn from_env() -> Self {
        Self {
            db_url: std::env::var("STUDY_DB_URL").ok(),
            questions: std::env::var("STUDY_QUESTIONS").ok(),
        }
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app <command> [--db <sqlite_url>] [--questions <dir|url>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status");
    eprintln!("  login <name>");
    eprintln!("  logout");
    eprintln!("  export [--out <file>]            default: {EXPORT_FILE_NAME}");
    eprintln!("  import <file>");
    eprintln!("  reset <entity>                   e.g. settings, coding-exam, learningProgress");
    eprintln!("  clear");
    eprintln!("  practice --chapter <c> [--difficulty <d>] [--type <t>]");
    eprintln!("  exam --chapter <c> [--count <n>] [--minutes <m>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --questions {DEFAULT_QUESTIONS_LOCATION}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_QUESTIONS, STUDY_LOG");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number(raw: String, flag: &'static str) -> Result<u32, ArgsError> {
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ArgsError::InvalidNumber { flag, raw }),
    }
}

#[derive(Default)]
struct Collected {
    positionals: Vec<String>,
    out: Option<PathBuf>,
    chapter: Option<String>,
    difficulty: Option<String>,
    question_type: Option<String>,
    count: Option<u32>,
    minutes: Option<u32>,
}

impl Args {
    /// Parse `argv` (without the program name) over environment defaults.
    pub fn parse(
        env: EnvDefaults,
        args: impl IntoIterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut args = args.into_iter();
        let name = args.next().ok_or(ArgsError::MissingCommand)?;

        let mut db_url = env
            .db_url
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut questions = env
            .questions
            .unwrap_or_else(|| DEFAULT_QUESTIONS_LOCATION.into());
        let mut collected = Collected::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--questions" => questions = require_value(&mut args, "--questions")?,
                "--out" => collected.out = Some(require_value(&mut args, "--out")?.into()),
                "--chapter" => collected.chapter = Some(require_value(&mut args, "--chapter")?),
                "--difficulty" => {
                    collected.difficulty = Some(require_value(&mut args, "--difficulty")?);
                }
                "--type" => collected.question_type = Some(require_value(&mut args, "--type")?),
                "--count" => {
                    let value = require_value(&mut args, "--count")?;
                    collected.count = Some(parse_number(value, "--count")?);
                }
                "--minutes" => {
                    let value = require_value(&mut args, "--minutes")?;
                    collected.minutes = Some(parse_number(value, "--minutes")?);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => collected.positionals.push(arg),
            }
        }

        let command = build_command(&name, collected)?;
        Ok(Self {
            db_url,
            questions,
            command,
        })
    }
}

fn build_command(name: &str, mut collected: Collected) -> Result<Command, ArgsError> {
    let mut positionals = std::mem::take(&mut collected.positionals).into_iter();
    let mut positional = |what: &'static str| {
        positionals
            .next()
            .ok_or(ArgsError::MissingArgument { what })
    };

    let command = match name {
        "status" => Command::Status,
        "login" => Command::Login {
            username: positional("username")?,
        },
        "logout" => Command::Logout,
        "export" => Command::Export {
            out: collected
                .out
                .take()
                .unwrap_or_else(|| PathBuf::from(EXPORT_FILE_NAME)),
        },
        "import" => Command::Import {
            file: positional("backup file")?.into(),
        },
        "reset" => {
            let raw = positional("entity")?;
            let entity = raw
                .parse::<EntityKind>()
                .map_err(|_| ArgsError::UnknownEntity { raw })?;
            Command::Reset { entity }
        }
        "clear" => Command::Clear,
        "practice" => Command::Practice {
            chapter: collected
                .chapter
                .take()
                .ok_or(ArgsError::MissingValue { flag: "--chapter" })?,
            difficulty: collected.difficulty.take().unwrap_or_else(|| ANY.into()),
            question_type: collected.question_type.take().unwrap_or_else(|| ANY.into()),
        },
        "exam" => Command::Exam {
            chapter: collected
                .chapter
                .take()
                .ok_or(ArgsError::MissingValue { flag: "--chapter" })?,
            count: collected.count,
            minutes: collected.minutes,
        },
        other => return Err(ArgsError::UnknownCommand(other.to_string())),
    };

    if let Some(extra) = positionals.next() {
        return Err(ArgsError::UnknownArg(extra));
    }
    Ok(command)
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

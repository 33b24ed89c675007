use std::path::Path;

use services::{AppServices, Clock, ImportError, ProgressSummary};
use study_core::key::GUEST;
use study_core::model::{ExamConfig, ExamTimer, identity_name};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod args;

use args::{Args, ArgsError, Command, EnvDefaults, print_usage};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("STUDY_LOG")
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if matches!(argv.first().map(String::as_str), Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }

    let parsed = Args::parse(EnvDefaults::from_env(), argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    tracing::debug!(db = %parsed.db_url, questions = %parsed.questions, "opening study state");
    let mut app =
        AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), &parsed.questions).await?;

    match parsed.command {
        Command::Status => print_status(&app),
        Command::Login { username } => {
            let identity = app.login(&username).await?;
            println!("logged in as {}", identity.username());
        }
        Command::Logout => {
            app.logout().await;
            println!("logged out; now {GUEST}");
        }
        Command::Export { out } => {
            let text = app.registry().export_all().to_pretty_json()?;
            tokio::fs::write(&out, text).await?;
            println!("exported state to {}", out.display());
        }
        Command::Import { file } => {
            let text = tokio::fs::read_to_string(&file).await?;
            match app.registry_mut().import_all(&text).await {
                Ok(report) => {
                    println!("imported {} entities", report.applied.len());
                    for name in &report.ignored {
                        println!("  ignored unknown field {name}");
                    }
                    for kind in &report.not_persisted {
                        println!("  {kind} kept in memory only");
                    }
                }
                Err(ImportError::Decode(err)) => {
                    eprintln!("{} is not a valid backup file: {err}", file.display());
                    std::process::exit(1);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Reset { entity } => {
            app.registry_mut().reset(entity).await;
            println!("reset {entity}");
        }
        Command::Clear => {
            app.registry_mut().clear_all().await;
            println!("cleared all state");
        }
        Command::Practice {
            chapter,
            difficulty,
            question_type,
        } => {
            let (practice, registry) = app.practice();
            let count = practice
                .start(registry, &chapter, &difficulty, &question_type)
                .await?;
            println!("{count} questions");
            for question in &registry.practice().state().questions {
                println!("  {} [{}]", question.id, question.kind);
            }
        }
        Command::Exam {
            chapter,
            count,
            minutes,
        } => {
            let defaults = ExamConfig::default();
            let config = ExamConfig {
                chapter,
                number_of_questions: count.unwrap_or(defaults.number_of_questions),
                time_limit: minutes.unwrap_or(defaults.time_limit),
                ..defaults
            };
            let timer = ExamTimer::start(&config);
            let (exam, registry) = app.exam();
            exam.start(registry, config, &mut rand::rng()).await?;
            let state = registry.exam().state();
            println!(
                "exam started: {} questions, {} on the clock",
                state.questions.len(),
                timer.display()
            );
            for question in &state.questions {
                println!("  {} [{}]", question.id, question.kind);
            }
        }
    }
    Ok(())
}

fn print_status(app: &AppServices) {
    let registry = app.registry();
    println!(
        "identity: {}",
        identity_name(registry.identity()).unwrap_or(GUEST)
    );
    for store in registry.stores() {
        let questions = store
            .snapshot()
            .ok()
            .and_then(|value| value.get("questions").and_then(|q| q.as_array()).map(Vec::len));
        match questions {
            Some(n) => println!("  {:<26} {n} questions", store.kind().export_name()),
            None => println!("  {}", store.kind().export_name()),
        }
    }

    let summary = ProgressSummary::of(registry.learning_progress().state());
    println!(
        "practice: {} answered, accuracy {}, streak {}",
        summary.questions_answered,
        summary
            .accuracy
            .map_or_else(|| "-".to_string(), |a| format!("{a}%")),
        summary.streak
    );
    println!(
        "exams: {} taken, {} passed, average {}",
        summary.exams_taken,
        summary.exams_passed,
        summary
            .average_exam_score
            .map_or_else(|| "-".to_string(), |s| format!("{s}%"))
    );
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
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

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

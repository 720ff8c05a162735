use std::fmt;

use quiz_core::model::{QuestionId, QuizId};
use services::{
    AttemptSession, BackendConfig, Clock, QuizServices, SessionError, SessionPhase, SubmitOutcome,
    SubmitTrigger,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::task::{JoinError, JoinHandle};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as log_fmt, registry};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingQuizId,
    InvalidQuizId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingQuizId => write!(f, "--quiz-id (or QUIZ_ID) is required"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- --quiz-id <id> [--db <sqlite_url>] [--retake]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_ID, QUIZ_DB_URL, QUIZ_LOG");
    eprintln!("  QUIZ_API_BASE_URL, QUIZ_API_TOKEN (required), QUIZ_HTTP_TIMEOUT_SECS");
}

struct Args {
    quiz_id: QuizId,
    db_url: String,
    retake: bool,
}

enum Parsed {
    Run(Args),
    Help,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Parsed, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("quiz.sqlite3".into()), normalize_sqlite_url);
        let mut quiz_id = match std::env::var("QUIZ_ID") {
            Ok(raw) => Some(parse_quiz_id(raw)?),
            Err(_) => None,
        };
        let mut retake = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--quiz-id" => {
                    quiz_id = Some(parse_quiz_id(require_value(args, "--quiz-id")?)?);
                }
                "--retake" => retake = true,
                "--help" | "-h" => return Ok(Parsed::Help),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Parsed::Run(Self {
            quiz_id: quiz_id.ok_or(ArgsError::MissingQuizId)?,
            db_url,
            retake,
        }))
    }
}

fn parse_quiz_id(raw: String) -> Result<QuizId, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidQuizId { raw })
}

fn normalize_sqlite_url(raw: String) -> String {
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
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

    let path = std::path::Path::new(path);
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

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("QUIZ_LOG")
        .from_env_lossy();
    registry()
        .with(log_fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

type Input = Lines<BufReader<Stdin>>;
type ForcedSubmitTask = JoinHandle<Result<SubmitOutcome, SessionError>>;

enum Flow {
    Continue,
    Quit,
}

enum Command {
    Answer { question: usize, choice: usize },
    Submit,
    Time,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "submit" | "s" => Some(Command::Submit),
        "time" | "t" => Some(Command::Time),
        "quit" | "q" => Some(Command::Quit),
        first => {
            let question = first.parse().ok()?;
            let choice = parts.next()?.parse().ok()?;
            Some(Command::Answer { question, choice })
        }
    }
}

async fn ask(input: &mut Input, prompt: &str) -> std::io::Result<Option<String>> {
    println!("{prompt}");
    Ok(input.next_line().await?.map(|line| line.trim().to_owned()))
}

async fn confirm(input: &mut Input, prompt: &str) -> std::io::Result<bool> {
    let answer = ask(input, &format!("{prompt} [y/N]")).await?;
    Ok(matches!(answer.as_deref(), Some("y" | "Y" | "yes")))
}

async fn wait_forced(task: &mut Option<ForcedSubmitTask>) -> Result<Result<SubmitOutcome, SessionError>, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn print_quiz(session: &AttemptSession) {
    let quiz = session.definition();
    let answers = session.answers();
    println!();
    println!("{}", quiz.title());
    if !quiz.description().is_empty() {
        println!("{}", quiz.description());
    }
    for (qi, question) in quiz.questions().iter().enumerate() {
        println!();
        println!("{}. {} ({} pts)", qi + 1, question.prompt(), question.points());
        let selected = answers.get(question.id());
        for (ci, choice) in question.choices().iter().enumerate() {
            let mark = if selected == Some(choice.id()) { "x" } else { " " };
            println!("   [{mark}] {}) {}", ci + 1, choice.text());
        }
    }
    println!();
    println!("Answer with `<question> <choice>`, then `submit`. `time` shows the clock, `quit` leaves.");
}

fn print_report(session: &AttemptSession) {
    let Some(report) = session.report() else {
        return;
    };
    println!();
    println!("Result: {} ({})", report.percentage_display(), report.points_display);
    if let (Some(correct), Some(incorrect)) = (report.correct, report.incorrect) {
        println!("Correct: {correct}  Incorrect: {incorrect}  Questions: {}", report.total_questions);
    }
    match report.passed {
        Some(true) => println!("Passed."),
        Some(false) => println!("Not passed."),
        None => {}
    }
}

fn resolve_choice(
    session: &AttemptSession,
    question: usize,
    choice: usize,
) -> Option<(QuestionId, quiz_core::model::ChoiceId)> {
    let q = session.definition().questions().get(question.checked_sub(1)?)?;
    let c = q.choices().get(choice.checked_sub(1)?)?;
    Some((q.id(), c.id()))
}

async fn take_attempt(session: &AttemptSession, input: &mut Input) -> Result<Flow, Box<dyn std::error::Error>> {
    print_quiz(session);
    let mut forced: Option<ForcedSubmitTask> = session.deadline_controller().map(|timer| {
        println!("Time left: {}", timer.remaining_display());
        let session = session.clone();
        tokio::spawn(async move { timer.drive(&session).await })
    });

    let flow = loop {
        if session.phase() == SessionPhase::Completed {
            break Flow::Continue;
        }

        let line = tokio::select! {
            line = input.next_line() => line?,
            joined = wait_forced(&mut forced) => {
                forced = None;
                match joined? {
                    Ok(SubmitOutcome::Graded(_)) => println!("Time is up. Your answers were submitted."),
                    Ok(SubmitOutcome::Suppressed) => {}
                    Err(err) => eprintln!("Automatic submit failed: {err}. Type `submit` to retry."),
                }
                continue;
            }
        };
        let Some(line) = line else {
            break Flow::Quit;
        };

        match parse_command(&line) {
            Some(Command::Answer { question, choice }) => {
                let Some((question, choice)) = resolve_choice(session, question, choice) else {
                    eprintln!("No such question or choice.");
                    continue;
                };
                match session.record_answer(question, choice).await {
                    Ok(()) => {
                        let progress = session.progress();
                        println!("Saved. {}/{} answered.", progress.answered, progress.total);
                    }
                    Err(err) => eprintln!("{err}"),
                }
            }
            Some(Command::Submit) => {
                let progress = session.progress();
                if !progress.is_complete
                    && !confirm(input, &format!("{} question(s) unanswered. Submit anyway?", progress.remaining)).await?
                {
                    continue;
                }
                if let Err(err) = session.submit(SubmitTrigger::User).await {
                    eprintln!("{err}");
                }
            }
            Some(Command::Time) => match session.deadline_controller() {
                Some(timer) => println!("Time left: {}", timer.remaining_display()),
                None => println!("This quiz is not timed."),
            },
            Some(Command::Quit) => break Flow::Quit,
            None => eprintln!("Unrecognised input."),
        }
    };

    if let Some(handle) = forced {
        handle.abort();
    }
    Ok(flow)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let parsed = match Args::parse(&mut argv) {
        Ok(Parsed::Run(args)) => args,
        Ok(Parsed::Help) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    init_tracing();
    let config = BackendConfig::from_env()?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    tracing::info!(quiz_id = %parsed.quiz_id, retake = parsed.retake, db = %parsed.db_url, "opening quiz");
    let services = QuizServices::new_sqlite(&parsed.db_url, Clock::system(), config).await?;
    let session = services
        .resolver()
        .resolve(parsed.quiz_id, parsed.retake)
        .await?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match session.phase() {
            SessionPhase::AnsweringTimed | SessionPhase::AnsweringUntimed => {
                if let Flow::Quit = take_attempt(&session, &mut input).await? {
                    println!("Your answers are saved. Run again to continue.");
                    return Ok(());
                }
            }
            SessionPhase::Completed => {
                print_report(&session);
                let Some(presenter) = session.presenter() else {
                    return Ok(());
                };
                if !confirm(&mut input, "Retake this quiz?").await? {
                    return Ok(());
                }
                if let Err(err) = presenter.retake.invoke().await {
                    eprintln!("{err}");
                }
            }
            SessionPhase::Error => {
                if let Some(failure) = session.last_error() {
                    eprintln!("{}", failure.message);
                }
                if !confirm(&mut input, "Try again?").await? {
                    return Ok(());
                }
                if let Err(err) = session.retake().await {
                    eprintln!("{err}");
                }
            }
            SessionPhase::Loading | SessionPhase::Submitting => {
                tokio::task::yield_now().await;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

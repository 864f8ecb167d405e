mod args;
mod terminal;

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use services::{AppConfig, AppServices, Backend, Clock, LoadReport};
use storage::repository::{AuthSession, SignUpOutcome};
use storage::schema::POSTGRES_SCHEMA;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command, print_usage};

/// Skipped CSV rows listed at startup before the rest are summarized.
const SHOWN_ROW_PROBLEMS: usize = 10;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).inspect_err(|_| print_usage())?;
    if args.help {
        print_usage();
        return Ok(());
    }

    // The schema is static; print it without touching config or the network.
    if args.command == Command::Schema {
        print!("{POSTGRES_SCHEMA}");
        return Ok(());
    }

    let mut config = AppConfig::from_env()?;
    if let Some(csv) = &args.csv {
        config.csv_path = Some(csv.clone());
    }
    if let Backend::Sqlite { url } = config.backend()? {
        prepare_sqlite_file(&url)?;
    }

    let services = AppServices::bootstrap(config, Clock::system()).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match args.command {
        Command::Schema => Ok(()),
        Command::SignUp => {
            let (email, password) = credentials(&args, &mut lines).await?;
            match services.auth().sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(session) => {
                    println!("Account created for {}.", session.identity.display_name());
                }
                SignUpOutcome::ConfirmationRequired { .. } => {
                    println!("Account created. Confirm your e-mail, then sign in.");
                }
            }
            Ok(())
        }
        Command::DeleteAccount => {
            let session = sign_in(&services, &args, &mut lines).await?;
            services.delete_account(&session).await?;
            println!("Account and progress deleted.");
            Ok(())
        }
        Command::Quiz => {
            let report = services.load_question_bank()?;
            report_problems(&report);
            let questions = Arc::new(report.questions);

            let session = sign_in(&services, &args, &mut lines).await?;
            let mut quiz = services
                .start_quiz(&session, questions, args.selection)
                .await?;
            quiz.set_always_show(args.show_answers);
            println!(
                "Signed in as {}. Type `help` for commands.",
                session.identity.display_name()
            );

            let auth = services.auth();
            let progress = services.progress();
            let session =
                terminal::run_quiz(&mut quiz, &auth, &progress, session, &mut lines).await?;
            if let Err(err) = auth.sign_out(&session).await {
                warn!(error = %err, "sign-out failed");
            }
            Ok(())
        }
    }
}

async fn credentials<R>(
    args: &Args,
    lines: &mut Lines<R>,
) -> Result<(String, String), Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    let email = match &args.email {
        Some(email) => email.clone(),
        None => terminal::prompt(lines, &mut stdout, "e-mail: ")
            .await?
            .ok_or("no e-mail given")?,
    };
    let source = PasswordSource::pick(
        std::env::var("QUIZ_PASSWORD").ok(),
        std::io::stdin().is_terminal(),
    );
    let password = match source {
        PasswordSource::Env(password) => password,
        PasswordSource::Hidden => read_hidden_password().await?,
        PasswordSource::Line => terminal::prompt(lines, &mut stdout, "password: ")
            .await?
            .ok_or("no password given")?,
    };
    Ok((email, password))
}

#[derive(Debug, PartialEq, Eq)]
enum PasswordSource {
    Env(String),
    /// Typed at the terminal with echo off.
    Hidden,
    /// Piped input, read like any other line.
    Line,
}

impl PasswordSource {
    fn pick(env: Option<String>, stdin_is_terminal: bool) -> Self {
        match env {
            Some(password) if !password.is_empty() => Self::Env(password),
            _ if stdin_is_terminal => Self::Hidden,
            _ => Self::Line,
        }
    }
}

/// Reads the password from the terminal with echo turned off.
async fn read_hidden_password() -> Result<String, Box<dyn std::error::Error>> {
    let password =
        tokio::task::spawn_blocking(|| rpassword::prompt_password("password: ")).await??;
    if password.is_empty() {
        return Err("no password given".into());
    }
    Ok(password)
}

async fn sign_in<R>(
    services: &AppServices,
    args: &Args,
    lines: &mut Lines<R>,
) -> Result<AuthSession, Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
{
    let (email, password) = credentials(args, lines).await?;
    Ok(services.auth().sign_in(&email, &password).await?)
}

fn report_problems(report: &LoadReport) {
    if report.problems.is_empty() {
        return;
    }
    warn!(skipped = report.problems.len(), "some question rows were skipped");
    for problem in report.problems.iter().take(SHOWN_ROW_PROBLEMS) {
        eprintln!("  row {}: {}", problem.row_number, problem.error);
    }
    if report.problems.len() > SHOWN_ROW_PROBLEMS {
        eprintln!("  ... and {} more", report.problems.len() - SHOWN_ROW_PROBLEMS);
    }
}

/// sqlx will not create a missing database file, so create it up front.
fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url.contains(":memory:") || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .unwrap_or(db_url);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(format!("invalid sqlite url: {db_url}").into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        info!(path = %path.display(), "created sqlite database file");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

use std::fmt;
use std::path::PathBuf;

use quiz_core::selection::{Selection, SelectionMode};

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidMode { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidMode { raw } => write!(f, "invalid mode: {raw}"),
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

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz [quiz] [--csv <path>] [--email <email>] [--mode <mode>] [--shuffle] [--show-answers]");
    eprintln!("  quiz signup --email <email>");
    eprintln!("  quiz delete-account --email <email>   # local sqlite backend only");
    eprintln!("  quiz schema                           # print the Postgres schema");
    eprintln!();
    eprintln!("Modes:");
    eprintln!("  all, range:<start>-<end>, random:<n>, wrong, unseen, calc, non-calc");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SUPABASE_URL        https://<project>.supabase.co or sqlite://quiz.sqlite3");
    eprintln!("  SUPABASE_ANON_KEY   public API key");
    eprintln!("  QUIZ_CSV_PATH, QUIZ_HTTP_TIMEOUT_SECS, QUIZ_EMAIL, QUIZ_PASSWORD, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quiz,
    SignUp,
    DeleteAccount,
    Schema,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "signup" => Some(Self::SignUp),
            "delete-account" => Some(Self::DeleteAccount),
            "schema" => Some(Self::Schema),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub command: Command,
    pub csv: Option<PathBuf>,
    pub email: Option<String>,
    pub selection: Selection,
    pub show_answers: bool,
    pub help: bool,
}

impl Args {
    /// Parses everything after the program name. No subcommand means `quiz`.
    pub fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter().peekable();

        let command = match args.peek().map(String::as_str) {
            None => Command::Quiz,
            Some(first) if first.starts_with('-') => Command::Quiz,
            Some(first) => {
                let command = Command::from_arg(first)
                    .ok_or_else(|| ArgsError::UnknownCommand(first.to_string()))?;
                args.next();
                command
            }
        };

        let mut parsed = Self {
            command,
            csv: None,
            email: std::env::var("QUIZ_EMAIL").ok().filter(|v| !v.trim().is_empty()),
            selection: Selection::default(),
            show_answers: false,
            help: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--csv" => parsed.csv = Some(PathBuf::from(require_value(&mut args, "--csv")?)),
                "--email" => parsed.email = Some(require_value(&mut args, "--email")?),
                "--mode" => {
                    parsed.selection.mode = parse_mode(&require_value(&mut args, "--mode")?)?;
                }
                "--shuffle" => parsed.selection.shuffle = true,
                "--show-answers" => parsed.show_answers = true,
                "--help" | "-h" => parsed.help = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

/// Parses a mode name as typed on the command line or at the quiz prompt.
pub fn parse_mode(raw: &str) -> Result<SelectionMode, ArgsError> {
    let invalid = || ArgsError::InvalidMode {
        raw: raw.to_string(),
    };
    let value = raw.trim().to_ascii_lowercase();
    let (name, param) = match value.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (value.as_str(), None),
    };

    let mode = match (name, param) {
        ("all", None) => SelectionMode::All,
        ("wrong", None) => SelectionMode::WrongOnly,
        ("unseen", None) => SelectionMode::NotSeen,
        ("calc", None) => SelectionMode::CalculationOnly,
        ("non-calc", None) => SelectionMode::NonCalculationOnly,
        ("random", Some(n)) => SelectionMode::RandomN {
            n: n.trim().parse().map_err(|_| invalid())?,
        },
        ("range", Some(bounds)) => {
            let (start, end) = bounds.split_once('-').ok_or_else(invalid)?;
            SelectionMode::Range {
                start: start.trim().parse().map_err(|_| invalid())?,
                end: end.trim().parse().map_err(|_| invalid())?,
            }
        }
        _ => return Err(invalid()),
    };
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn defaults_to_quiz_command() {
        let args = parse(&["--shuffle", "--csv", "bank.csv"]).unwrap();
        assert_eq!(args.command, Command::Quiz);
        assert!(args.selection.shuffle);
        assert!(!args.show_answers);
        assert_eq!(args.csv, Some(PathBuf::from("bank.csv")));
    }

    #[test]
    fn parses_subcommands_and_flags() {
        let args = parse(&["signup", "--email", "ann@example.com"]).unwrap();
        assert_eq!(args.command, Command::SignUp);
        assert_eq!(args.email.as_deref(), Some("ann@example.com"));
        assert_eq!(parse(&["schema"]).unwrap().command, Command::Schema);
        assert!(parse(&["quiz", "--show-answers"]).unwrap().show_answers);
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!(
            parse(&["--csv"]).unwrap_err(),
            ArgsError::MissingValue { flag: "--csv" }
        );
        assert_eq!(
            parse(&["frobnicate"]).unwrap_err(),
            ArgsError::UnknownCommand("frobnicate".into())
        );
        assert_eq!(
            parse(&["--verbose"]).unwrap_err(),
            ArgsError::UnknownArg("--verbose".into())
        );
    }

    #[test]
    fn parses_modes() {
        assert_eq!(parse_mode("all").unwrap(), SelectionMode::All);
        assert_eq!(parse_mode("Wrong").unwrap(), SelectionMode::WrongOnly);
        assert_eq!(parse_mode("non-calc").unwrap(), SelectionMode::NonCalculationOnly);
        assert_eq!(parse_mode("random:25").unwrap(), SelectionMode::RandomN { n: 25 });
        assert_eq!(
            parse_mode("range:40-10").unwrap(),
            SelectionMode::Range { start: 40, end: 10 }
        );
        assert!(parse_mode("range:40").is_err());
        assert!(parse_mode("random").is_err());
        assert!(parse_mode("sometimes").is_err());
    }
}

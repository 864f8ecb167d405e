//! Line-oriented quiz loop over stdin/stdout.

use std::fmt::Write as _;

use quiz_core::model::Question;
use quiz_core::selection::Selection;
use quiz_core::text::clean_label;
use services::{AttemptOutcome, AuthService, ProgressError, ProgressService, QuizSession, SaveStatus};
use storage::repository::AuthSession;
use tokio::io::{AsyncBufRead, AsyncWriteExt, Lines, Stdout};

use crate::args::parse_mode;

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// 1-based choice number as typed.
    Choice(usize),
    Next,
    Previous,
    Jump(String),
    Mode(String),
    Shuffle(bool),
    /// Show the current answer once without submitting.
    Reveal,
    ShowAnswers(bool),
    Reset,
    Stats,
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let input = match word.to_ascii_lowercase().as_str() {
            "n" | "next" => Input::Next,
            "p" | "prev" | "previous" => Input::Previous,
            "go" | "g" if !rest.is_empty() => Input::Jump(rest.to_string()),
            "mode" if !rest.is_empty() => Input::Mode(rest.to_string()),
            "shuffle" => match rest {
                "on" => Input::Shuffle(true),
                "off" => Input::Shuffle(false),
                _ => Input::Unknown(line.to_string()),
            },
            "reveal" | "r" => Input::Reveal,
            "show" => match rest {
                "" => Input::Reveal,
                "on" => Input::ShowAnswers(true),
                "off" => Input::ShowAnswers(false),
                _ => Input::Unknown(line.to_string()),
            },
            "reset" => Input::Reset,
            "stats" | "s" => Input::Stats,
            "help" | "h" | "?" => Input::Help,
            "quit" | "q" | "exit" => Input::Quit,
            _ => match line.parse::<usize>() {
                Ok(choice) => Input::Choice(choice),
                Err(_) => Input::Unknown(line.to_string()),
            },
        };
        Some(input)
    }
}

const HELP: &str = "\
  <number>        answer with that choice
  n / p           next / previous question
  go <id>         jump to a question id, e.g. go 47 or go Q47
  mode <mode>     all, range:<a>-<b>, random:<n>, wrong, unseen, calc, non-calc
  shuffle on|off  shuffle the current mode
  reveal          show the answer without submitting
  show on|off     always show answers with the question
  reset           clear all saved progress
  stats           show progress
  quit            leave";

pub fn render_question(question: &Question, stats: &services::Stats, reveal: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "[{stats}]");
    let _ = writeln!(out, "Q{}. {}", question.id(), question.prompt());
    for (index, choice) in question.choices().iter().enumerate() {
        let _ = writeln!(out, "  {}) {}", index + 1, clean_label(choice));
    }
    if reveal {
        out.push_str(&render_answer(question));
    }
    out
}

/// The correct choice and explanation, without grading anything.
pub fn render_answer(question: &Question) -> String {
    let mut out = format!(
        "Correct: {}) {}\n",
        question.correct_index() + 1,
        clean_label(question.correct_choice())
    );
    if !question.explanation().is_empty() {
        let _ = writeln!(out, "{}", question.explanation());
    }
    out
}

pub fn render_outcome(question: &Question, outcome: &AttemptOutcome) -> String {
    let mut out = String::new();
    if outcome.correct {
        let _ = writeln!(out, "Correct.");
    } else {
        let _ = writeln!(
            out,
            "Incorrect. Answer: {}) {}",
            outcome.correct_index + 1,
            clean_label(question.correct_choice())
        );
    }
    if !question.explanation().is_empty() {
        let _ = writeln!(out, "{}", question.explanation());
    }
    match &outcome.saved {
        SaveStatus::Saved => {}
        SaveStatus::Unsaved { reason, transient } => {
            let hint = if *transient { " (try again later)" } else { "" };
            let _ = writeln!(out, "warning: progress not saved: {reason}{hint}");
        }
        SaveStatus::Denied { reason } => {
            let _ = writeln!(out, "error: progress write refused: {reason}");
        }
    }
    out
}

/// Prompts for and returns the next non-empty line, or `None` at end of input.
pub async fn prompt<R>(
    lines: &mut Lines<R>,
    stdout: &mut Stdout,
    label: &str,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        stdout.write_all(label.as_bytes()).await?;
        stdout.flush().await?;
        match lines.next_line().await? {
            None => return Ok(None),
            Some(line) if line.trim().is_empty() => {}
            Some(line) => return Ok(Some(line.trim().to_string())),
        }
    }
}

/// Runs the quiz until the user quits or input ends.
///
/// Only fatal errors are returned: an expired session that cannot be renewed
/// or a write the backend refuses.
pub async fn run_quiz<R>(
    quiz: &mut QuizSession,
    auth: &AuthService,
    progress: &ProgressService,
    mut session: AuthSession,
    lines: &mut Lines<R>,
) -> Result<AuthSession, Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    let mut show = true;

    loop {
        if show {
            let text = match quiz.current() {
                Some(question) => render_question(question, &quiz.stats(), quiz.always_show()),
                None => format!("\n[{}]\nNo questions in this mode. Try `mode all`.\n", quiz.stats()),
            };
            stdout.write_all(text.as_bytes()).await?;
        }
        show = true;

        let Some(line) = prompt(lines, &mut stdout, "> ").await? else {
            return Ok(session);
        };
        let Some(input) = Input::parse(&line) else {
            continue;
        };

        let message = match input {
            Input::Quit => return Ok(session),
            Input::Help => {
                show = false;
                format!("{HELP}\n")
            }
            Input::Stats => {
                show = false;
                format!("{}\n", quiz.stats())
            }
            Input::Next => {
                if !quiz.next() {
                    show = false;
                    "Already at the last question.\n".to_string()
                } else {
                    String::new()
                }
            }
            Input::Previous => {
                if !quiz.previous() {
                    show = false;
                    "Already at the first question.\n".to_string()
                } else {
                    String::new()
                }
            }
            Input::Jump(query) => match quiz.jump(&query) {
                Some(jump) if jump.exact => String::new(),
                Some(jump) => format!(
                    "Q{} is not in this list; showing the nearest question.\n",
                    jump.requested
                ),
                None => {
                    show = false;
                    format!("Nothing to jump to for {query:?}.\n")
                }
            },
            Input::Mode(raw) => match parse_mode(&raw) {
                Ok(mode) => {
                    let shuffle = quiz.selection().shuffle;
                    quiz.set_selection(Selection::new(mode).with_shuffle(shuffle));
                    String::new()
                }
                Err(err) => {
                    show = false;
                    format!("{err}\n")
                }
            },
            Input::Shuffle(on) => {
                quiz.set_selection(quiz.selection().with_shuffle(on));
                String::new()
            }
            Input::Reveal => {
                show = false;
                match quiz.current() {
                    Some(question) => render_answer(question),
                    None => "No question selected.\n".to_string(),
                }
            }
            Input::ShowAnswers(on) => {
                quiz.set_always_show(on);
                String::new()
            }
            Input::Reset => {
                session = auth.ensure_fresh(session).await?;
                match quiz.reset_progress(progress, &session).await {
                    SaveStatus::Saved => "Progress cleared.\n".to_string(),
                    SaveStatus::Unsaved { reason, .. } => {
                        show = false;
                        format!("warning: progress not cleared: {reason}\n")
                    }
                    SaveStatus::Denied { reason } => {
                        return Err(ProgressError::Unauthorized(reason).into());
                    }
                }
            }
            Input::Choice(choice) => {
                show = false;
                let Some(question) = quiz.current().cloned() else {
                    stdout.write_all(b"No question selected.\n").await?;
                    continue;
                };
                if choice == 0 {
                    "Choices start at 1.\n".to_string()
                } else {
                    session = auth.ensure_fresh(session).await?;
                    match quiz.answer(progress, &session, choice - 1).await {
                        Ok(outcome) => {
                            let text = render_outcome(&question, &outcome);
                            if let Err(err) = outcome.saved.check_denied() {
                                stdout.write_all(text.as_bytes()).await?;
                                return Err(err.into());
                            }
                            text
                        }
                        Err(err @ ProgressError::ChoiceOutOfRange { .. }) => format!("{err}\n"),
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            Input::Unknown(raw) => {
                show = false;
                format!("Unknown command {raw:?}. Type `help` for commands.\n")
            }
        };
        stdout.write_all(message.as_bytes()).await?;
    }
}

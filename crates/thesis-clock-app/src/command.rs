//! Console commands.
//!
//! One command per line. The console stands in for the clock widget's
//! buttons and pickers:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `edit` | Open the digit wheel |
//! | `up <field>` / `down <field>` | Roll one digit, e.g. `up month-units` |
//! | `commit` / `cancel` | Close the wheel |
//! | `date YYYY-MM-DD` | Date picker |
//! | `time HH:MM:SS` | Time picker |
//! | `set YYYY-MM-DDTHH:MM:SS` | Set the virtual clock directly |
//! | `real` | Back to real time |
//! | `now` | Show the clock |
//! | `remote` | Show the server's clock |
//! | `help`, `quit` | |

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thesis_clock_core::{DigitError, Direction, Field, WheelOp};

use crate::error::ServiceError;
use crate::service::{ClockHandle, DISPLAY_FORMAT};

/// Text printed by `help`.
pub const HELP: &str = "\
commands:
  edit                       open the digit wheel
  up <field>, down <field>   roll one digit while editing
  commit                     use the edited time
  cancel                     discard the edit
  date YYYY-MM-DD            pick a date
  time HH:MM:SS              pick a time of day
  set YYYY-MM-DDTHH:MM:SS    set the virtual clock
  real                       return to real time
  now                        show the clock
  remote                     show the server's clock
  help                       this text
  quit                       exit
fields:
  month-tens month-units day-tens day-units
  year-thousands year-hundreds year-tens year-units
  hour-tens hour-units minute-tens minute-units second-tens second-units";

/// A parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Open an edit session.
    Edit,
    /// Roll one digit.
    Wheel(WheelOp),
    /// Commit the edit session.
    Commit,
    /// Cancel the edit session.
    Cancel,
    /// Pick a date.
    Date(NaiveDate),
    /// Pick a time of day.
    Time(NaiveTime),
    /// Set the virtual clock.
    Set(NaiveDateTime),
    /// Revert to real time.
    Real,
    /// Show the clock.
    Now,
    /// Show the remote authority's clock.
    Remote,
    /// Show help.
    Help,
    /// Leave the console.
    Quit,
}

/// Errors from parsing a console line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The line was blank.
    #[error("empty command")]
    Empty,

    /// The first word is not a command.
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),

    /// A required argument is missing.
    #[error("`{command}` expects {expected}")]
    MissingArgument {
        /// The command.
        command: &'static str,
        /// Description of the argument.
        expected: &'static str,
    },

    /// An argument did not parse.
    #[error("`{command}`: `{value}` is not {expected} ({reason})")]
    InvalidArgument {
        /// The command.
        command: &'static str,
        /// The offending text.
        value: String,
        /// Description of the argument.
        expected: &'static str,
        /// Why parsing failed.
        reason: String,
    },

    /// More words than the command takes.
    #[error("`{command}`: unexpected argument `{value}`")]
    UnexpectedArgument {
        /// The command.
        command: &'static str,
        /// The first extra word.
        value: String,
    },

    /// The wheel field is unknown.
    #[error(transparent)]
    Digit(#[from] DigitError),
}

const DATE: &str = "a date YYYY-MM-DD";
const TIME: &str = "a time HH:MM:SS";
const TIMESTAMP: &str = "a timestamp YYYY-MM-DDTHH:MM:SS";

impl ConsoleCommand {
    /// The command word, for messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Wheel(op) => match op.direction {
                Direction::Up => "up",
                Direction::Down => "down",
            },
            Self::Commit => "commit",
            Self::Cancel => "cancel",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Set(_) => "set",
            Self::Real => "real",
            Self::Now => "now",
            Self::Remote => "remote",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }

    const fn takes_argument(self) -> bool {
        matches!(
            self,
            Self::Wheel(_) | Self::Date(_) | Self::Time(_) | Self::Set(_)
        )
    }
}

impl FromStr for ConsoleCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match verb.as_str() {
            "edit" => Self::Edit,
            "up" | "down" => {
                let direction: Direction = verb.parse()?;
                let field: Field = first(&args, "up/down", "a wheel field")?.parse()?;
                Self::Wheel(WheelOp::new(field, direction))
            }
            "commit" => Self::Commit,
            "cancel" => Self::Cancel,
            "date" => {
                let value = first(&args, "date", DATE)?;
                let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map_err(|e| invalid("date", value, DATE, &e))?;
                Self::Date(date)
            }
            "time" => {
                let value = first(&args, "time", TIME)?;
                let time = NaiveTime::parse_from_str(value, "%H:%M:%S")
                    .map_err(|e| invalid("time", value, TIME, &e))?;
                Self::Time(time)
            }
            "set" => {
                let value = first(&args, "set", TIMESTAMP)?;
                let at = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                    .map_err(|e| invalid("set", value, TIMESTAMP, &e))?;
                Self::Set(at)
            }
            "real" => Self::Real,
            "now" | "show" => Self::Now,
            "remote" => Self::Remote,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return Err(CommandError::Unknown(verb)),
        };

        if let Some(value) = args.get(usize::from(command.takes_argument())) {
            return Err(CommandError::UnexpectedArgument {
                command: command.name(),
                value: (*value).to_owned(),
            });
        }
        Ok(command)
    }
}

/// Outcome of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Show this text.
    Print(String),
    /// Leave the console.
    Quit,
}

/// Run `command` against the clock.
///
/// # Errors
///
/// Returns [`ServiceError`] when the clock rejects the request or the
/// remote authority cannot be reached.
pub async fn execute(
    handle: &ClockHandle,
    command: ConsoleCommand,
) -> Result<Outcome, ServiceError> {
    let snapshot = match command {
        ConsoleCommand::Edit => handle.enter_editing().await?,
        ConsoleCommand::Wheel(op) => handle.apply_digit_edit(op).await?,
        ConsoleCommand::Commit => handle.commit().await?,
        ConsoleCommand::Cancel => handle.cancel_editing().await?,
        ConsoleCommand::Date(date) => handle.pick_date(date).await?,
        ConsoleCommand::Time(time) => handle.pick_time(time).await?,
        ConsoleCommand::Set(value) => handle.set_virtual_clock(value).await?,
        ConsoleCommand::Real => handle.revert_to_real().await?,
        ConsoleCommand::Now => handle.snapshot(),
        ConsoleCommand::Remote => {
            let remote = handle.remote_time().await?;
            let label = if remote.is_virtual { "virtual" } else { "real" };
            return Ok(Outcome::Print(format!(
                "server: {} ({label})",
                remote.current_time.format(DISPLAY_FORMAT)
            )));
        }
        ConsoleCommand::Help => return Ok(Outcome::Print(HELP.to_owned())),
        ConsoleCommand::Quit => return Ok(Outcome::Quit),
    };
    Ok(Outcome::Print(snapshot.to_string()))
}

fn first<'a>(
    args: &[&'a str],
    command: &'static str,
    expected: &'static str,
) -> Result<&'a str, CommandError> {
    args.first()
        .copied()
        .ok_or(CommandError::MissingArgument { command, expected })
}

fn invalid(
    command: &'static str,
    value: &str,
    expected: &'static str,
    reason: &chrono::ParseError,
) -> CommandError {
    CommandError::InvalidArgument {
        command,
        value: value.to_owned(),
        expected,
        reason: reason.to_string(),
    }
}

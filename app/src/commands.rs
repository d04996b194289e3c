//! REPL input.
//!
//! [`parse`] turns a line into a [`Command`]; [`resolve`] maps it onto an
//! action against the current state. Blank todo text is rejected here, before
//! anything is dispatched.

use crate::app::{AppAction, AppState};
use crate::model::{Password, TodoPatch};
use crate::session::SessionAction;
use crate::todos::TodoAction;
use crate::view::FormMode;
use thiserror::Error;

/// Help text listing every command
pub const HELP: &str = "\
Commands:
  login <email> <password>    sign in
  signup <email> <password>   create an account
  login | signup              switch the form
  logout                      sign out
  add <text>                  create a todo
  toggle <n>                  mark todo n done or not done
  edit <n> <text>             change the text of todo n
  delete <n>                  remove todo n
  list                        show the list again
  help                        show this help
  quit                        exit";

/// A parsed input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sign in with credentials
    LogIn {
        /// Account email
        email: String,
        /// Account password
        password: Password,
    },
    /// Create an account
    SignUp {
        /// Account email
        email: String,
        /// Account password
        password: Password,
    },
    /// Show the given credentials form
    ShowForm(FormMode),
    /// Sign out
    LogOut,
    /// Create a todo
    Add(String),
    /// Flip the completion flag of the n-th todo
    Toggle(usize),
    /// Replace the text of the n-th todo
    Edit(usize, String),
    /// Remove the n-th todo
    Delete(usize),
    /// Redraw
    List,
    /// Print the command list
    Help,
    /// Exit
    Quit,
}

/// Input that cannot be turned into a command or an action
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line
    #[error("type a command, or `help`")]
    Empty,
    /// First word not recognized
    #[error("unknown command `{0}`, type `help`")]
    Unknown(String),
    /// Required argument absent
    #[error("usage: {0}")]
    Usage(&'static str),
    /// Position is not a positive number
    #[error("`{0}` is not a todo number")]
    InvalidNumber(String),
    /// Todo text is blank
    #[error("todo text cannot be empty")]
    EmptyText,
    /// Position past the end of the list
    #[error("there is no todo #{0}")]
    NoSuchTodo(usize),
    /// Todo command without a session
    #[error("log in first")]
    NotSignedIn,
}

/// What the REPL should do with a command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Send an action to the store
    Dispatch(AppAction),
    /// Switch the credentials form
    ShowForm(FormMode),
    /// Redraw the current screen
    Redraw,
    /// Print the help text
    Help,
    /// Exit the loop
    Quit,
}

/// Parses one input line.
///
/// # Errors
///
/// Returns a [`CommandError`] describing what is wrong with the line.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim_start();
    let (word, raw_rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = raw_rest.trim();

    match word.to_ascii_lowercase().as_str() {
        "" => Err(CommandError::Empty),
        "login" | "signup" => {
            let signup = word.eq_ignore_ascii_case("signup");
            if rest.is_empty() {
                return Ok(Command::ShowForm(if signup {
                    FormMode::SignUp
                } else {
                    FormMode::LogIn
                }));
            }
            let usage = if signup {
                "signup <email> <password>"
            } else {
                "login <email> <password>"
            };
            // The password is everything after the separator, spaces included
            let (email, password) = raw_rest
                .trim_start()
                .split_once(char::is_whitespace)
                .map(|(email, password)| (email.to_string(), password))
                .filter(|(_, password)| !password.is_empty())
                .ok_or(CommandError::Usage(usage))?;
            let password = Password::new(password);
            Ok(if signup {
                Command::SignUp { email, password }
            } else {
                Command::LogIn { email, password }
            })
        },
        "logout" => Ok(Command::LogOut),
        "add" => Ok(Command::Add(text(rest)?)),
        "toggle" => Ok(Command::Toggle(number(rest, "toggle <n>")?)),
        "delete" => Ok(Command::Delete(number(rest, "delete <n>")?)),
        "edit" => {
            let (position, new_text) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            Ok(Command::Edit(number(position, "edit <n> <text>")?, text(new_text)?))
        },
        "list" | "ls" => Ok(Command::List),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(CommandError::Unknown(word.to_string())),
    }
}

fn text(raw: &str) -> Result<String, CommandError> {
    let text = raw.trim();
    if text.is_empty() {
        Err(CommandError::EmptyText)
    } else {
        Ok(text.to_string())
    }
}

fn number(raw: &str, usage: &'static str) -> Result<usize, CommandError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::InvalidNumber(raw.to_string())),
    }
}

/// Maps a command onto what the REPL should do, given the current state.
///
/// # Errors
///
/// `NotSignedIn` for todo commands without a session and `NoSuchTodo` for
/// positions past the end of the list.
pub fn resolve(command: Command, state: &AppState) -> Result<Outcome, CommandError> {
    let todo_at = |n: usize| {
        if state.session.session.is_none() {
            return Err(CommandError::NotSignedIn);
        }
        n.checked_sub(1)
            .and_then(|index| state.todos.todos.get(index))
            .ok_or(CommandError::NoSuchTodo(n))
    };

    let action: AppAction = match command {
        Command::LogIn { email, password } => SessionAction::LogIn { email, password }.into(),
        Command::SignUp { email, password } => SessionAction::SignUp { email, password }.into(),
        Command::LogOut => SessionAction::LogOut.into(),
        Command::Add(text) => {
            if state.session.session.is_none() {
                return Err(CommandError::NotSignedIn);
            }
            TodoAction::Create { text }.into()
        },
        Command::Toggle(n) => {
            let todo = todo_at(n)?;
            TodoAction::Update {
                id: todo.id.clone(),
                patch: TodoPatch::completed(!todo.completed),
            }
            .into()
        },
        Command::Edit(n, text) => TodoAction::Update {
            id: todo_at(n)?.id.clone(),
            patch: TodoPatch::text(text),
        }
        .into(),
        Command::Delete(n) => TodoAction::Delete {
            id: todo_at(n)?.id.clone(),
        }
        .into(),
        Command::ShowForm(mode) => return Ok(Outcome::ShowForm(mode)),
        Command::List => return Ok(Outcome::Redraw),
        Command::Help => return Ok(Outcome::Help),
        Command::Quit => return Ok(Outcome::Quit),
    };
    Ok(Outcome::Dispatch(action))
}

//! Command-line argument parsing for the parley CLI.
//!
//! Arguments are matched by hand: the first word picks the command and the
//! remaining words are its operands and flags.

use crate::models::Feedback;

/// Usage text printed by `parley help`.
pub const USAGE: &str = "\
Usage: parley <command> [args]

Commands:
  login [email]                   Sign in (password is prompted)
  register [email] [--name NAME]  Create an account and sign in
  logout                          Sign out and clear local state
  whoami                          Show the signed-in user
  list                            List conversations
  open <conversation-id>          Show a conversation's messages
  chat [--new] [-c ID] [message]  Send a message, or chat interactively
  rate <message-id> <up|down|none>
  rename <conversation-id> <title...>
  delete <conversation-id>
  version                         Print the version
  help                            Show this help

Environment:
  PARLEY_API_URL, PARLEY_MODEL, PARLEY_TIMEOUT_SECS,
  PARLEY_STREAM_TIMEOUT_SECS, PARLEY_DATA_DIR, PARLEY_LOG";

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Login {
        email: Option<String>,
    },
    Register {
        email: Option<String>,
        username: Option<String>,
    },
    Logout,
    WhoAmI,
    List,
    Open {
        conversation_id: String,
    },
    /// Without a message, read messages from stdin until EOF
    Chat {
        conversation_id: Option<String>,
        new: bool,
        message: Option<String>,
    },
    Rate {
        message_id: String,
        feedback: Feedback,
    },
    Rename {
        conversation_id: String,
        title: String,
    },
    Delete {
        conversation_id: String,
    },
    Version,
    Help,
    /// Arguments that could not be understood, with the reason
    Invalid(String),
}

impl CliCommand {
    /// Whether the command talks to the backend or the local state.
    pub fn needs_session(&self) -> bool {
        !matches!(
            self,
            CliCommand::Version | CliCommand::Help | CliCommand::Invalid(_)
        )
    }
}

/// Parse command-line arguments and return the appropriate command.
///
/// # Examples
///
/// ```
/// use parley::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["parley".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let mut args = args.skip(1);
    let Some(command) = args.next() else {
        return CliCommand::Help;
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "--version" | "-V" | "version" => CliCommand::Version,
        "--help" | "-h" | "help" => CliCommand::Help,
        "login" => CliCommand::Login {
            email: rest.first().cloned(),
        },
        "register" => parse_register(rest),
        "logout" => CliCommand::Logout,
        "whoami" => CliCommand::WhoAmI,
        "list" | "ls" => CliCommand::List,
        "open" => match rest.first() {
            Some(id) => CliCommand::Open {
                conversation_id: id.clone(),
            },
            None => CliCommand::Invalid("open needs a conversation id".to_string()),
        },
        "chat" => parse_chat(rest),
        "rate" => match rest.as_slice() {
            [message_id, feedback] => match feedback.parse() {
                Ok(feedback) => CliCommand::Rate {
                    message_id: message_id.clone(),
                    feedback,
                },
                Err(e) => CliCommand::Invalid(e),
            },
            _ => CliCommand::Invalid("rate needs a message id and up, down or none".to_string()),
        },
        "rename" => match rest.split_first() {
            Some((id, title)) if !title.is_empty() => CliCommand::Rename {
                conversation_id: id.clone(),
                title: title.join(" "),
            },
            _ => CliCommand::Invalid("rename needs a conversation id and a title".to_string()),
        },
        "delete" | "rm" => match rest.first() {
            Some(id) => CliCommand::Delete {
                conversation_id: id.clone(),
            },
            None => CliCommand::Invalid("delete needs a conversation id".to_string()),
        },
        other => CliCommand::Invalid(format!("unknown command '{}'", other)),
    }
}

fn parse_register(rest: Vec<String>) -> CliCommand {
    let mut email = None;
    let mut username = None;
    let mut iter = rest.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--name" | "-n" => match iter.next() {
                Some(name) => username = Some(name),
                None => return CliCommand::Invalid("--name needs a value".to_string()),
            },
            _ if email.is_none() => email = Some(arg),
            _ => return CliCommand::Invalid(format!("unexpected argument '{}'", arg)),
        }
    }
    CliCommand::Register { email, username }
}

fn parse_chat(rest: Vec<String>) -> CliCommand {
    let mut conversation_id = None;
    let mut new = false;
    let mut words = Vec::new();
    let mut iter = rest.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--new" | "-n" => new = true,
            "--conversation" | "-c" => match iter.next() {
                Some(id) => conversation_id = Some(id),
                None => return CliCommand::Invalid("-c needs a conversation id".to_string()),
            },
            // Everything after -- is message text
            "--" => {
                words.extend(iter.by_ref());
            }
            _ => words.push(arg),
        }
    }
    if new && conversation_id.is_some() {
        return CliCommand::Invalid("--new and -c cannot be combined".to_string());
    }
    let message = (!words.is_empty()).then(|| words.join(" "));
    CliCommand::Chat {
        conversation_id,
        new,
        message,
    }
}

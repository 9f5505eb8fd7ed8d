//! CLI module for parley.
//!
//! # Usage
//!
//! ```ignore
//! use parley::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! let mut session = parley::session::ChatSession::open(config)?;
//! run_cli_command(command, &mut session).await?;
//! ```

pub mod args;
mod prompt;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use version::{version_string, VERSION};

use std::io::{self, Write};

use chrono::Local;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::ApiError;
use crate::models::{Feedback, MessageRole};
use crate::session::ChatSession;

const EXIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

/// Run a parsed command against `session`.
///
/// `Version`, `Help` and `Invalid` do not touch the session and are normally
/// handled by the caller before a session is opened.
pub async fn run_cli_command(command: CliCommand, session: &mut ChatSession) -> Result<()> {
    match command {
        CliCommand::Version => println!("{}", version_string()),
        CliCommand::Help => println!("{}", USAGE),
        CliCommand::Invalid(reason) => return Err(eyre!("{}\n\n{}", reason, USAGE)),
        CliCommand::Login { email } => login(session, email).await?,
        CliCommand::Register { email, username } => register(session, email, username).await?,
        CliCommand::Logout => {
            session.logout().await;
            println!("Signed out.");
        }
        CliCommand::WhoAmI => {
            require_auth(session)?;
            let user = session.current_user().await?;
            println!("{} <{}>", user.display_name(), user.email);
            println!("user id: {}", user.user_id);
        }
        CliCommand::List => {
            require_auth(session)?;
            session.refresh_conversations().await?;
            print_conversations(session);
        }
        CliCommand::Open { conversation_id } => {
            require_auth(session)?;
            session.open_conversation(&conversation_id).await?;
            print_messages(session);
        }
        CliCommand::Chat {
            conversation_id,
            new,
            message,
        } => {
            require_auth(session)?;
            if new {
                session.new_conversation();
            } else if let Some(id) = conversation_id {
                session.open_conversation(&id).await?;
            }
            match message {
                Some(text) => send_and_print(session, &text).await?,
                None => interactive_chat(session).await?,
            }
        }
        CliCommand::Rate {
            message_id,
            feedback,
        } => {
            require_auth(session)?;
            session.rate_message(&message_id, feedback).await?;
            println!("Feedback saved.");
        }
        CliCommand::Rename {
            conversation_id,
            title,
        } => {
            require_auth(session)?;
            session.rename_conversation(&conversation_id, &title).await?;
            println!("Renamed.");
        }
        CliCommand::Delete { conversation_id } => {
            require_auth(session)?;
            session.delete_conversation(&conversation_id).await?;
            println!("Deleted.");
        }
    }
    Ok(())
}

fn require_auth(session: &ChatSession) -> Result<()> {
    if session.is_authenticated() {
        Ok(())
    } else {
        Err(eyre!("Not signed in. Run `parley login` first."))
    }
}

async fn login(session: &mut ChatSession, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt::prompt_required("Email: ")?,
    };
    let password = prompt::prompt_password("Password: ")?;
    let user = session.login(&email, &password).await?;
    println!("Signed in as {}.", user.display_name());

    if let Err(e) = session.refresh_conversations().await {
        tracing::warn!(error = %e, "Could not fetch conversations after login");
    }
    Ok(())
}

async fn register(
    session: &mut ChatSession,
    email: Option<String>,
    username: Option<String>,
) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt::prompt_required("Email: ")?,
    };
    let username = match username {
        Some(name) => Some(name),
        None => Some(prompt::prompt_line("Username (optional): ")?).filter(|n| !n.is_empty()),
    };
    let password = prompt::prompt_password("Password: ")?;
    let confirm = prompt::prompt_password("Confirm password: ")?;
    if password != confirm {
        return Err(eyre!("Passwords do not match"));
    }

    let user = session
        .register(username.as_deref(), &email, &password)
        .await?;
    println!("Account created. Signed in as {}.", user.display_name());
    Ok(())
}

fn print_conversations(session: &ChatSession) {
    let store = session.store();
    if store.conversations().is_empty() {
        println!("No conversations yet. Start one with `parley chat`.");
        return;
    }
    let current = store.current_conversation_id();
    for conversation in store.conversations() {
        let marker = if current == Some(conversation.conversation_id.as_str()) {
            '*'
        } else {
            ' '
        };
        let count = conversation
            .message_count
            .map(|n| format!("{:>4}", n))
            .unwrap_or_else(|| "   -".to_string());
        println!(
            "{} {}  {}  {}  {}",
            marker,
            conversation.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            count,
            conversation.conversation_id,
            conversation.title
        );
    }
}

fn print_messages(session: &ChatSession) {
    let messages = session.store().current_messages();
    if messages.is_empty() {
        println!("(no messages)");
        return;
    }
    for message in messages {
        let who = match message.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };
        let rating = match message.feedback {
            Some(Feedback::Positive) => " [+1]",
            Some(Feedback::Negative) => " [-1]",
            _ => "",
        };
        println!("--- {} ({}){}", who, message.id, rating);
        println!("{}\n", message.content);
    }
}

/// Send one message and print the reply as it streams. Ctrl-C abandons the
/// reply without exiting.
async fn send_and_print(session: &mut ChatSession, text: &str) -> Result<(), ApiError> {
    let before = session.store().current_conversation_id().map(str::to_string);

    let result = tokio::select! {
        result = session.send_message(text, |chunk| {
            print!("{}", chunk);
            let _ = io::stdout().flush();
        }) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    println!();

    match result {
        Some(Ok(report)) => {
            if let Some(error) = report.error {
                eprintln!("Reply interrupted: {}", error.user_message());
            }
            if report.conversation_id.is_some() && report.conversation_id != before {
                if let Some(id) = report.conversation_id.as_deref() {
                    eprintln!("(conversation {})", id);
                }
            }
            Ok(())
        }
        Some(Err(e)) => Err(e),
        None => {
            if let Some(id) = session.pending_reply().map(str::to_string) {
                session.cancel_reply(&id);
            }
            eprintln!("Cancelled.");
            Ok(())
        }
    }
}

/// Read messages from stdin until EOF, `/quit` or Ctrl-C.
async fn interactive_chat(session: &mut ChatSession) -> Result<()> {
    println!("Type a message and press Enter. /quit to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&text) {
            return Ok(());
        }
        match send_and_print(session, text).await {
            Ok(()) => {}
            Err(e) if e.requires_reauth() => return Err(e.into()),
            Err(e) => eprintln!("Error: {}", e.user_message()),
        }
    }
}

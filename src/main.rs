use color_eyre::Result;
use tracing_subscriber::prelude::*;

use parley::cli::{parse_args, run_cli_command, version_string, CliCommand, USAGE};
use parley::config::ClientConfig;
use parley::error::ApiError;
use parley::session::ChatSession;

/// Log filter used when `PARLEY_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn";

fn init_tracing() {
    // Logs go to stderr; stdout carries the streamed reply
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("PARLEY_LOG")
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let command = parse_args(std::env::args());

    // Handle commands that need no session before any initialization
    if !command.needs_session() {
        match command {
            CliCommand::Invalid(reason) => {
                eprintln!("Error: {}\n\n{}", reason, USAGE);
                std::process::exit(2);
            }
            CliCommand::Version => println!("{}", version_string()),
            _ => println!("{}", USAGE),
        }
        return Ok(());
    }

    color_eyre::install()?;
    init_tracing();

    let config = ClientConfig::from_env();
    tracing::debug!(base_url = %config.base_url, data_dir = %config.data_dir.display(), "Starting");

    let runtime = tokio::runtime::Runtime::new()?;
    let mut session = ChatSession::open(config)?;

    if let Err(report) = runtime.block_on(run_cli_command(command, &mut session)) {
        match report.downcast_ref::<ApiError>() {
            Some(e) => {
                eprintln!("Error: {}", e.user_message());
                if e.requires_reauth() {
                    eprintln!("Run `parley login` to sign in again.");
                }
                tracing::debug!(error = ?report, "Command failed");
                std::process::exit(1);
            }
            None => return Err(report),
        }
    }

    Ok(())
}

//! Interactive prompts for the CLI.

use std::io::{self, BufRead, Write};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

/// Print `label` and read one trimmed line from stdin.
pub fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush().wrap_err("Failed to flush stdout")?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .wrap_err("Failed to read from stdin")?;
    if read == 0 {
        return Err(eyre!("No input"));
    }
    Ok(line.trim().to_string())
}

/// Like [`prompt_line`] but retries until the answer is not empty.
pub fn prompt_required(label: &str) -> Result<String> {
    loop {
        let value = prompt_line(label)?;
        if !value.is_empty() {
            return Ok(value);
        }
    }
}

/// Read a password without echo.
pub fn prompt_password(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush().wrap_err("Failed to flush stdout")?;
    rpassword::read_password().wrap_err("Failed to read password")
}

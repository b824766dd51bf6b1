//! Terminal output and prompts.

use std::fmt::Display;
use std::io::{self, BufRead, Write};

use serde::Serialize;

use crate::error::CliError;

/// Print one line on stdout. A closed pipe is not an error for a CLI.
pub fn line(text: impl Display) {
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{text}");
}

/// Print one line on stderr.
pub fn error(text: impl Display) {
    let mut err = io::stderr().lock();
    let _ = writeln!(err, "{text}");
}

/// Pretty-print a value as JSON.
pub fn json(value: &impl Serialize) -> Result<(), CliError> {
    line(serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ask a yes/no question on the terminal; anything but yes is no.
pub fn confirm(prompt: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    {
        let mut out = io::stdout().lock();
        let _ = write!(out, "{prompt} [y/N] ");
        let _ = out.flush();
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "o" | "oui"
    )
}

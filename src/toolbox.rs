//! Operator-facing output and prompts.

use crate::error::{Result, RunbookError};
use std::io::{BufRead, Write};

/// Output sink and prompt source used by handlers.
pub trait Toolbox {
    fn output(&self, message: &str);

    /// Ask a free-form question; returns the answer without the trailing newline.
    fn ask(&self, prompt: &str) -> Result<String>;

    fn confirm(&self, prompt: &str) -> Result<bool>;

    fn warn(&self, message: &str);
}

/// Terminal implementation over stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleToolbox;

impl ConsoleToolbox {
    fn read_line(&self, prompt: &str) -> Result<String> {
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{} ", prompt)
            .and_then(|_| stdout.flush())
            .map_err(|e| RunbookError::UserError(format!("failed to write prompt: {}", e)))?;

        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| RunbookError::UserError(format!("failed to read answer: {}", e)))?;
        if read == 0 {
            // stdin closed
            return Err(RunbookError::Cancelled);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Toolbox for ConsoleToolbox {
    fn output(&self, message: &str) {
        println!("{}", message);
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        self.read_line(prompt)
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        loop {
            let answer = self.read_line(&format!("{} [y/n]", prompt))?;
            match parse_confirmation(&answer) {
                Some(value) => return Ok(value),
                None => self.warn("Please answer 'y' or 'n'."),
            }
        }
    }

    fn warn(&self, message: &str) {
        eprintln!("WARNING: {}", message);
    }
}

fn parse_confirmation(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

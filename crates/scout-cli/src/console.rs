//! CLI console utilities

use colored::*;
use std::io::{self, Write};

/// CLI console for formatted output
pub struct Console {
    verbose: bool,
}

impl Console {
    /// Create a new console
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Print an info message (verbose only)
    pub fn info(&self, message: &str) {
        if self.verbose {
            println!("{} {}", "ℹ".blue().bold(), message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    }

    /// Print the prompt for the next user input
    pub fn prompt(&self) {
        print!("{} ", ">".cyan().bold());
        let _ = io::stdout().flush();
    }

    /// Print one streamed token without a newline
    pub fn token(&self, token: &str) {
        print!("{}", token);
        let _ = io::stdout().flush();
    }

    /// Announce a tool dispatch
    pub fn tool_dispatch(&self, name: &str) {
        println!();
        println!("{} {}", "→ tool".magenta().bold(), name.magenta());
    }

    /// Announce a tool result
    pub fn tool_result(&self, name: &str, is_error: bool) {
        if is_error {
            println!("{} {} {}", "←".red().bold(), name.red(), "failed".red());
        } else if self.verbose {
            println!("{} {}", "←".green().bold(), name.green());
        }
    }

    /// End the current output line
    pub fn end_line(&self) {
        println!();
    }
}

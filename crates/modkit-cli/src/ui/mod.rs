//! Terminal output

pub mod progress;

use crossterm::style::Stylize;

pub use progress::TerminalProgress;

/// Print a finished step
pub fn success(msg: &str) {
    println!("{} {msg}", "✓".green());
}

/// Print something the user should look at
pub fn warning(msg: &str) {
    eprintln!("{} {msg}", "!".yellow().bold());
}

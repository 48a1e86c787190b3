//! Progress bar
//!
//! Renders progress events on a single stderr line, redrawn in place.

use std::io::{Write, stderr};
use std::sync::Mutex;

use crossterm::{
    QueueableCommand,
    cursor::MoveToColumn,
    style::Stylize,
    terminal::{Clear, ClearType},
};
use modkit_core::ProgressSink;
use modkit_schema::ProgressEvent;

const BAR_WIDTH: usize = 30;

/// Draws a bar with the latest label.
#[derive(Debug, Default)]
pub struct TerminalProgress {
    // Last drawn percentage, to skip redundant redraws.
    last: Mutex<Option<(u32, String)>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for TerminalProgress {
    fn update(&self, event: ProgressEvent) {
        let percent = (event.fraction * 100.0).round() as u32;
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        let key = (percent, event.label.clone());
        if last.as_ref() == Some(&key) {
            return;
        }
        *last = Some(key);

        let mut out = stderr();
        let _ = out.queue(MoveToColumn(0));
        let _ = out.queue(Clear(ClearType::CurrentLine));
        let _ = write!(
            out,
            "{} {}",
            format_bar(event.fraction, BAR_WIDTH).cyan(),
            event.label
        );
        if event.fraction >= 1.0 {
            let _ = writeln!(out);
        }
        let _ = out.flush();
    }
}

/// Format `[####      ]  40%` for a fraction in [0, 1].
pub fn format_bar(fraction: f64, width: usize) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = ((fraction * width as f64).floor() as usize).min(width);
    let percent = (fraction * 100.0).round() as u32;
    format!(
        "[{}{}] {percent:>3}%",
        "#".repeat(filled),
        " ".repeat(width - filled)
    )
}

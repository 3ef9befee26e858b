//! Progress output.
//!
//! The runner reports progress through a [`Printer`]. Library callers get
//! [`TracingPrinter`], which forwards every line to `tracing`; the CLI uses
//! [`ConsolePrinter`] for colored, timestamped terminal output.

use chrono::Local;
use colored::Colorize;
use tracing::{error, info, warn};

/// Kind of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Neutral progress.
    Info,
    /// A step completed.
    Success,
    /// Something was skipped or looks off.
    Warning,
    /// A step failed.
    Error,
}

impl Tone {
    /// Line marker.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Info | Self::Success => "=>",
            Self::Warning => "!>",
            Self::Error => "x>",
        }
    }
}

/// Sink for progress lines.
pub trait Printer: Send + Sync {
    /// Prints a line.
    fn print(&self, tone: Tone, message: &str);

    /// Prints a line prefixed with the current local time.
    fn print_with_time(&self, tone: Tone, message: &str);
}

/// Forwards progress lines to `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPrinter;

impl Printer for TracingPrinter {
    fn print(&self, tone: Tone, message: &str) {
        match tone {
            Tone::Info | Tone::Success => info!("{} {message}", tone.marker()),
            Tone::Warning => warn!("{} {message}", tone.marker()),
            Tone::Error => error!("{} {message}", tone.marker()),
        }
    }

    fn print_with_time(&self, tone: Tone, message: &str) {
        // tracing stamps its own events.
        self.print(tone, message);
    }
}

/// Writes colored lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrinter;

impl ConsolePrinter {
    fn render(tone: Tone, message: &str) -> String {
        let line = format!("{} {message}", tone.marker());
        match tone {
            Tone::Info => line.blue().to_string(),
            Tone::Success => line.green().to_string(),
            Tone::Warning => line.yellow().to_string(),
            Tone::Error => line.red().to_string(),
        }
    }
}

impl Printer for ConsolePrinter {
    fn print(&self, tone: Tone, message: &str) {
        println!("{}", Self::render(tone, message));
    }

    fn print_with_time(&self, tone: Tone, message: &str) {
        let now = Local::now().format("%d.%m.%Y %H:%M:%S");
        println!("[{now}] {}", Self::render(tone, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers() {
        assert_eq!(Tone::Info.marker(), "=>");
        assert_eq!(Tone::Success.marker(), "=>");
        assert_eq!(Tone::Warning.marker(), "!>");
        assert_eq!(Tone::Error.marker(), "x>");
    }

    #[test]
    fn test_render_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(
            ConsolePrinter::render(Tone::Error, "error executing migration 1 - users"),
            "x> error executing migration 1 - users"
        );
    }
}

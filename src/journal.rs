//! Console progress for the user, mirrored into the log file for the lines that matter.

use std::fmt::Display;

use owo_colors::OwoColorize;

use crate::logging::JOURNAL_TARGET;

#[derive(Debug, Clone, Copy, Default)]
pub struct Journal {
    verbose: bool,
}

impl Journal {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Progress detail, shown only in verbose mode.
    pub fn note(&self, message: impl Display) {
        if self.verbose {
            println!("{message}");
        }
    }

    /// Always shown, and appended to the log file.
    pub fn record(&self, message: &str) {
        println!("{message}");
        tracing::info!(target: JOURNAL_TARGET, "{message}");
    }

    /// A story that was skipped; the batch goes on.
    pub fn problem(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message.bright_red());
        tracing::info!(target: JOURNAL_TARGET, "{message}");
    }

    pub fn chapter(&self, number: &str, title: &str) {
        self.note(format!(
            "{} {} - {}",
            "Downloading chapter".dimmed(),
            number.bold().blue(),
            title.yellow()
        ));
    }

    pub fn written(&self, path: &std::path::Path) {
        println!(
            "{} {}",
            "Writing into".dimmed(),
            path.display().bold().green()
        );
    }
}

//! Terminal output formatting for the sitekit CLI.
//!
//! Provides Cargo-style status output with right-aligned coloured verbs.
//! All status output goes to stderr; stdout is reserved for completions.

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// ANSI escape codes.
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

/// Width for right-aligned verb column.
const VERB_WIDTH: usize = 12;

/// Lines recorded by a [`Printer::buffered`] printer.
pub type Captured = Arc<Mutex<Vec<u8>>>;

/// Terminal-aware status printer.
///
/// Prints Cargo-style status lines to stderr with optional ANSI colours.
/// Colour is enabled when stderr is a terminal.
pub struct Printer {
    color: bool,
    captured: Option<Captured>,
}

impl Printer {
    pub fn new() -> Self {
        Self {
            color: io::stderr().is_terminal(),
            captured: None,
        }
    }

    /// A colourless printer that keeps its lines in memory instead.
    pub fn buffered() -> (Self, Captured) {
        let captured = Captured::default();
        let printer = Self {
            color: false,
            captured: Some(Arc::clone(&captured)),
        };
        (printer, captured)
    }

    /// Print a status line with a green bold verb.
    /// e.g. "   Compiled compile-styles (4 files, 120ms)"
    pub fn status(&self, verb: &str, message: &str) {
        self.print_line(GREEN, verb, message);
    }

    /// Print a success/completion line with a green bold verb.
    pub fn success(&self, verb: &str, message: &str) {
        self.print_line(GREEN, verb, message);
    }

    /// Print the headline and help of a failure without stopping.
    pub fn report(&self, err: &crate::error::SiteError) {
        self.error("error", &err.to_string());
        if let Some(help) = miette::Diagnostic::help(err) {
            let line = self.dim(&format!("help: {}", help));
            self.emit(&format!("{:>VERB_WIDTH$} {}", "", line));
        }
    }

    /// Print an informational line with a cyan bold verb.
    pub fn info(&self, verb: &str, message: &str) {
        self.print_line(CYAN, verb, message);
    }

    /// Print a warning line with a yellow bold verb.
    pub fn warning(&self, verb: &str, message: &str) {
        self.print_line(YELLOW, verb, message);
    }

    /// Print an error line with a red bold verb.
    pub fn error(&self, verb: &str, message: &str) {
        self.print_line(RED, verb, message);
    }

    /// Format a string as dim/grey.
    pub fn dim(&self, text: &str) -> String {
        if self.color {
            format!("{DIM}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn print_line(&self, color: &str, verb: &str, message: &str) {
        if self.color {
            self.emit(&format!("{BOLD}{color}{verb:>VERB_WIDTH$}{RESET} {message}"));
        } else {
            self.emit(&format!("{verb:>VERB_WIDTH$} {message}"));
        }
    }

    fn emit(&self, line: &str) {
        match &self.captured {
            Some(captured) => {
                if let Ok(mut buffer) = captured.lock() {
                    let _ = writeln!(buffer, "{line}");
                }
            }
            None => {
                let _ = writeln!(io::stderr().lock(), "{line}");
            }
        }
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

/// Pluralize a count: `plural(1, "file", "files")` → "1 file".
pub fn plural(n: usize, singular: &str, pluralized: &str) -> String {
    if n == 1 {
        format!("{} {}", n, singular)
    } else {
        format!("{} {}", n, pluralized)
    }
}

/// Human-friendly elapsed time: "850ms", "2.40s".
pub fn format_duration(elapsed: Duration) -> String {
    if elapsed.as_millis() < 1000 {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}

/// Return a relative display path when possible, absolute otherwise.
pub fn display_path(path: &std::path::Path) -> String {
    if let Ok(cwd) = std::env::current_dir() {
        if let Ok(relative) = path.strip_prefix(&cwd) {
            let s = relative.display().to_string();
            if s.is_empty() {
                return ".".to_string();
            }
            return s;
        }
    }
    path.display().to_string()
}

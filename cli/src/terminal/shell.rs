//! Shell output abstraction for the CLI.
//!
//! Human mode writes styled messages to stderr and results to stdout. JSON
//! mode writes one JSON document per line to stdout and nothing else.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::OnceLock;

use console::style;
use serde::Serialize;

/// Global shell instance.
static SHELL: OnceLock<Shell> = OnceLock::new();

/// Initialize the global shell.
///
/// Must be called once at program start; later calls are ignored.
pub fn init(json: bool) {
    let shell = if json { Shell::json() } else { Shell::new() };
    let _ = SHELL.set(shell);
}

/// Get a reference to the global shell, human mode if never initialized.
pub fn get() -> &'static Shell {
    SHELL.get_or_init(Shell::new)
}

/// Shell output abstraction.
#[derive(Debug)]
pub struct Shell {
    output: ShellOut,
}

#[derive(Debug)]
enum ShellOut {
    Human,
    Json,
}

impl Shell {
    const fn new() -> Self {
        Self {
            output: ShellOut::Human,
        }
    }

    const fn json() -> Self {
        Self {
            output: ShellOut::Json,
        }
    }

    /// Check if output is in JSON mode.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.output, ShellOut::Json)
    }

    /// Print a status message with a green header.
    pub fn status(&self, status: impl Display, message: impl Display) -> io::Result<()> {
        match &self.output {
            ShellOut::Human => {
                let mut stderr = io::stderr().lock();
                writeln!(stderr, "{} {message}", style(status).green().bold())?;
                stderr.flush()
            }
            ShellOut::Json => Ok(()),
        }
    }

    /// Print a diagnostic with a level prefix.
    fn diagnostic(&self, level: &'static str, message: impl Display) -> io::Result<()> {
        match &self.output {
            ShellOut::Human => {
                let prefix = match level {
                    "error" => style(level).red().bold(),
                    "warning" => style(level).yellow().bold(),
                    _ => style(level).cyan().bold(),
                };
                let mut stderr = io::stderr().lock();
                writeln!(stderr, "{prefix}: {message}")?;
                stderr.flush()
            }
            ShellOut::Json => {
                #[derive(Serialize)]
                struct Diagnostic<'a> {
                    level: &'static str,
                    message: &'a str,
                }
                self.emit(&Diagnostic {
                    level,
                    message: &message.to_string(),
                })
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: impl Display) -> io::Result<()> {
        self.diagnostic("error", message)
    }

    /// Print a warning message.
    pub fn warn(&self, message: impl Display) -> io::Result<()> {
        self.diagnostic("warning", message)
    }

    /// Print an informational note. Silent in JSON mode.
    pub fn note(&self, message: impl Display) -> io::Result<()> {
        match &self.output {
            ShellOut::Human => self.diagnostic("note", message),
            ShellOut::Json => Ok(()),
        }
    }

    /// Print a plain line. Silent in JSON mode.
    pub fn println(&self, message: impl Display) -> io::Result<()> {
        match &self.output {
            ShellOut::Human => writeln!(io::stderr().lock(), "{message}"),
            ShellOut::Json => Ok(()),
        }
    }

    /// Print a header/title. Silent in JSON mode.
    pub fn header(&self, message: impl Display) -> io::Result<()> {
        match &self.output {
            ShellOut::Human => writeln!(io::stderr().lock(), "{}", style(format!("▶ {message}")).green().bold()),
            ShellOut::Json => Ok(()),
        }
    }

    /// Write a result document to stdout.
    ///
    /// Compact in JSON mode; pretty-printed for humans.
    pub fn emit(&self, value: &impl Serialize) -> io::Result<()> {
        let json = match &self.output {
            ShellOut::Json => serde_json::to_string(value)?,
            ShellOut::Human => serde_json::to_string_pretty(value)?,
        };
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{json}")?;
        stdout.flush()
    }
}

// Convenience functions that use the global shell

/// Print a status message.
pub fn status(status: impl Display, message: impl Display) {
    let _ = get().status(status, message);
}

/// Print an error message (use `error!` macro instead).
#[doc(hidden)]
pub fn error_fn(message: impl Display) {
    let _ = get().error(message);
}

/// Print a warning message (use `warn!` macro instead).
#[doc(hidden)]
pub fn warn_fn(message: impl Display) {
    let _ = get().warn(message);
}

/// Print a note message (use `note!` macro instead).
#[doc(hidden)]
pub fn note_fn(message: impl Display) {
    let _ = get().note(message);
}

/// Print a plain line (use `line!` macro instead).
#[doc(hidden)]
pub fn println(message: impl Display) {
    let _ = get().println(message);
}

/// Print a header (use `header!` macro instead).
#[doc(hidden)]
pub fn header_fn(message: impl Display) {
    let _ = get().header(message);
}

/// Write a result document to stdout.
///
/// # Errors
///
/// Fails if stdout is closed or `value` cannot be serialized.
pub fn emit(value: &impl Serialize) -> io::Result<()> {
    get().emit(value)
}

// ============================================================================
// Convenience macros
// ============================================================================

/// Print a success message with a checkmark.
///
/// # Example
/// ```ignore
/// success!("Tree is valid");
/// success!("Removed {} instances", count);
/// ```
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::shell::status("✓", format!($($arg)*))
    };
}

/// Print a plain line (like println but through shell).
///
/// # Example
/// ```ignore
/// line!("Canonical order:");
/// line!("  {} {}", key, uuid);
/// line!();  // empty line
/// ```
#[macro_export]
macro_rules! line {
    () => {
        $crate::shell::println("")
    };
    ($($arg:tt)*) => {
        $crate::shell::println(format!($($arg)*))
    };
}

/// Print a warning message.
///
/// # Example
/// ```ignore
/// warn!("Instance {} is orphaned", uuid);
/// ```
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::shell::warn_fn(format!($($arg)*))
    };
}

/// Print an error message.
///
/// # Example
/// ```ignore
/// error!("{}: {}", path, message);
/// ```
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::shell::error_fn(format!($($arg)*))
    };
}

/// Print a note/info message.
///
/// # Example
/// ```ignore
/// note!("Using definitions from {}", path.display());
/// ```
#[macro_export]
macro_rules! note {
    ($($arg:tt)*) => {
        $crate::shell::note_fn(format!($($arg)*))
    };
}

/// Print a header/title.
///
/// # Example
/// ```ignore
/// header!("Canonical order");
/// ```
#[macro_export]
macro_rules! header {
    ($($arg:tt)*) => {
        $crate::shell::header_fn(format!($($arg)*))
    };
}

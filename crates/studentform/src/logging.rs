//! Logging setup for studentform.
//!
//! Form operations log through `tracing`; this module installs the
//! subscriber for the `stform` binary and for tests.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings and above. Fallbacks and skipped location entries show up here.
    #[default]
    Normal,
    /// Info and above.
    Verbose,
    /// Everything, including cascade and draft tracing.
    Trace,
}

impl Verbosity {
    /// Build a verbosity from the `-v` count and `-q` flag.
    #[must_use]
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    /// Convert verbosity to a tracing level.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::INFO,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Targets the default filter applies to: the library and the `stform`
/// binary.
const LOG_TARGETS: [&str; 2] = ["studentform", "stform"];

impl Verbosity {
    /// `EnvFilter` directives for this verbosity, e.g.
    /// `studentform=warn,stform=warn`.
    #[must_use]
    pub fn filter_directives(&self) -> String {
        let level = self.to_level_filter().as_str().to_ascii_lowercase();
        LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence over `verbosity` when set. Output goes to
/// stderr so command output on stdout stays machine-readable.
///
/// # Examples
///
/// ```no_run
/// use studentform::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directives()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // Ignore error if already set
    let _ = subscriber.try_init();
}

/// Initialize logging for tests.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

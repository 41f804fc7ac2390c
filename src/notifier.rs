//! Unified logging and progress UI.
//!
//! [`Notifier`] wraps `env_logger` (text logs) and `indicatif` (spinner) under a single
//! verbosity switch, and owns the plain stdout report of the check:
//! - [`Notifier::status`] — a report line on stdout, flushed immediately, at every level.
//!   `SKIP:`/`ERROR:`/`SUCCESS:` verdicts and the captured request go through here.
//! - [`Notifier::info`]/[`Notifier::debug`]/[`Notifier::warn`]/[`Notifier::trace`] — emit logs
//!   on stderr, filtered by the verbosity level (and `RUST_LOG`).
//! - [`Notifier::spinner`] — a live spinner while a slow step runs (Quiet mode only).
//!   Report lines printed while it spins are drawn through [`ProgressBar::suspend`].
//!
//! Levels map to `env_logger` filters; Quiet keeps only warnings.

use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Record};
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0, // Report lines and a spinner, warnings only
    Info = 1,  // Text logs at info level
    Debug = 2, // Text logs at debug level
    Trace = 3, // Text logs at trace level
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    logger: env_logger::Logger,
    active_spinner: Mutex<Option<ProgressBar>>,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        let verbosity = VerbosityLevel::from(verbosity_level);

        let logger = env_logger::Builder::from_env(Env::default())
            .filter_level(verbosity.to_log_level())
            .build();

        // `log` macros in library code share the filter; only the first notifier installs it.
        let _ = env_logger::Builder::from_env(Env::default())
            .filter_level(verbosity.to_log_level())
            .try_init();

        Self {
            verbosity,
            logger,
            active_spinner: Mutex::new(None),
        }
    }

    /// Prints a report line on stdout regardless of verbosity.
    pub fn status(&self, message: &str) {
        let print = || {
            let mut stdout = std::io::stdout().lock();
            // A closed stdout must not abort the check.
            let _ = writeln!(stdout, "{message}");
            let _ = stdout.flush();
        };

        match self.active_spinner() {
            Some(spinner) => spinner.suspend(print),
            None => print(),
        }
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn trace(&self, message: &str) {
        self.log(Level::Trace, message);
    }

    fn log(&self, level: Level, message: &str) {
        self.logger.log(
            &Record::builder()
                .args(format_args!("{}", message))
                .level(level)
                .target(module_path!())
                .build(),
        );
    }

    /// Starts a spinner with `message` in Quiet mode; other levels log the message instead.
    ///
    /// The caller finishes the returned bar once the step is done.
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if self.verbosity != VerbosityLevel::Quiet {
            self.info(message);
            return None;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut active) = self.active_spinner.lock() {
            *active = Some(spinner.clone());
        }
        Some(spinner)
    }

    /// The spinner started by [`Notifier::spinner`], until the caller finishes it.
    pub fn active_spinner(&self) -> Option<ProgressBar> {
        let mut active = self.active_spinner.lock().ok()?;
        if active.as_ref().is_some_and(ProgressBar::is_finished) {
            *active = None;
        }
        active.clone()
    }

    pub fn verbosity_level(&self) -> VerbosityLevel {
        self.verbosity
    }
}

use std::sync::OnceLock;
use std::time::SystemTime;

use log::{Level, LevelFilter, Log, Metadata, Record};
use nu_ansi_term::ansi::RESET;
use nu_ansi_term::{Color, Style};

/// Target string used for milestone lines ("Upload completed", "Connection
/// closed", ...) that must stay visible even when the user passed `-q`.
pub const MILESTONE_TARGET: &str = "milestone";

struct Logger {
    quiet: bool,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target() == MILESTONE_TARGET || !self.quiet
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let time = humantime::format_rfc3339_seconds(SystemTime::now());
        let dim = Style::new().dimmed().prefix();

        let color = match record.level() {
            Level::Trace => Color::Purple,
            Level::Debug => Color::Blue,
            Level::Info => Color::Green,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
        };

        eprintln!(
            "{dim}{time}{RESET} {}{:5}{RESET} {}{}{RESET}{dim}:{RESET} {}",
            color.bold().prefix(),
            record.level(),
            Style::new().bold().prefix(),
            record.target(),
            record.args(),
        );
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Installs the process-wide logger. `verbose` and `quiet` are mutually
/// exclusive at the CLI layer; `quiet` still lets milestone lines through.
pub fn init(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };

    let logger = LOGGER.get_or_init(|| Logger { quiet });
    // The global ceiling stays high enough for Info-level milestone lines
    // to reach the logger even under `-q`; `Logger::enabled` is what
    // actually narrows ordinary output down to errors-only when quiet.
    log::set_max_level(level.max(LevelFilter::Info));
    let _ = log::set_logger(logger);
}

/// Logs a message that bypasses `-q`. Used for the handful of
/// user-facing milestones a file-transfer tool should always report.
#[macro_export]
macro_rules! milestone {
    ($($arg:tt)+) => {
        log::info!(target: $crate::logger::MILESTONE_TARGET, $($arg)+)
    };
}

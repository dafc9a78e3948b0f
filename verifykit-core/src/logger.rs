//! Pluggable host logger.
//!
//! Library code logs through the [`log`] facade; hosts register a [`Logger`]
//! implementation once at startup to receive those records (typically
//! forwarding them to the platform's log sink).

use std::sync::{Arc, OnceLock};

/// Receiver for SDK log messages.
///
/// Implement this once in the host and register it with [`set_logger`].
pub trait Logger: Sync + Send {
    /// Delivers one log message at the given level.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Extremely detailed tracing output.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress messages.
    Info,
    /// Potentially harmful situations.
    Warn,
    /// Errors that may still allow the SDK to continue.
    Error,
}

struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let is_record_from_verifykit = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("verifykit"));

        let is_debug_or_trace_level =
            record.level() == log::Level::Debug || record.level() == log::Level::Trace;

        // Debug/trace noise from other crates never reaches the host.
        if is_debug_or_trace_level && !is_record_from_verifykit {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            let level = log_level(record.level());
            let message = format!("{}", record.args());
            logger.log(level, message);
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Registers the host logger and installs the `log` facade bridge.
///
/// Call once, before constructing the SDK. A second call is ignored.
pub fn set_logger(logger: Arc<dyn Logger>) {
    match LOGGER_INSTANCE.set(logger) {
        Ok(()) => (),
        Err(_) => println!("Logger already set"),
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

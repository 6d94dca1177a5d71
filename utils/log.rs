//! Console logging for the Explorer BSP
//!
//! A `log::Log` backend that formats each record as a single
//! `[LEVEL] target: message` line and hands it to a [`Console`]. Lines are
//! assembled in a fixed buffer and truncated when they do not fit.

use core::fmt::{self, Write};

use log::{Metadata, Record};

use crate::config;
use crate::sync::SpinLock;
use crate::{Error, Result};

/// Longest line written to the console, in bytes
pub const LINE_CAPACITY: usize = 192;

/// Byte sink for log lines
pub trait Console: Sync {
    /// Write a string to the console
    fn write_str(&self, s: &str);
}

/// Logger writing to the installed console
pub struct ConsoleLogger {
    console: SpinLock<Option<&'static dyn Console>>,
}

static LOGGER: ConsoleLogger = ConsoleLogger::new();

impl ConsoleLogger {
    /// Logger with no console attached
    pub const fn new() -> Self {
        Self {
            console: SpinLock::new(None),
        }
    }

    /// Attach `console`, replacing any previous one
    pub fn attach(&self, console: &'static dyn Console) {
        *self.console.lock_irq_disabled() = Some(console);
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line = heapless::String::<LINE_CAPACITY>::new();
        // A full buffer only truncates the line
        let _ = format_line(&mut line, record.level(), record.target(), record.args());

        // Holding the lock keeps lines from interleaving
        let console = self.console.lock_irq_disabled();
        if let Some(console) = *console {
            console.write_str(&line);
            console.write_str("\n");
        }
    }

    fn flush(&self) {}
}

/// Format one log line without the trailing newline
pub fn format_line(
    out: &mut impl Write,
    level: log::Level,
    target: &str,
    args: &fmt::Arguments<'_>,
) -> fmt::Result {
    write!(out, "[{:<5}] {}: {}", level, target, args)
}

/// Install the console logger
///
/// The maximum level follows the `verbose` and `debug` features.
pub fn init(console: &'static dyn Console) -> Result<()> {
    LOGGER.attach(console);
    log::set_logger(&LOGGER).map_err(|_| Error::AlreadyInitialized)?;
    log::set_max_level(config::default_log_level());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::sync::Mutex;

    struct Capture(Mutex<String>);

    impl Console for Capture {
        fn write_str(&self, s: &str) {
            self.0.lock().unwrap().push_str(s);
        }
    }

    #[test]
    fn test_line_format() {
        let mut line = String::new();
        format_line(
            &mut line,
            log::Level::Warn,
            "explorer_bsp::fatal",
            &format_args!("line {} spurious", 12),
        )
        .unwrap();
        assert_eq!(line, "[WARN ] explorer_bsp::fatal: line 12 spurious");
    }

    #[test]
    fn test_long_line_is_truncated() {
        let mut line = heapless::String::<16>::new();
        let result = format_line(
            &mut line,
            log::Level::Error,
            "target",
            &format_args!("{}", "x".repeat(64)),
        );
        assert!(result.is_err());
        assert!(line.starts_with("[ERROR] target"));
    }

    #[test]
    fn test_logger_writes_to_console() {
        let capture: &'static Capture = Box::leak(Box::new(Capture(Mutex::new(String::new()))));
        init(capture).unwrap();
        assert_eq!(init(capture), Err(Error::AlreadyInitialized));

        log::error!(target: "erep", "doorbell {:#x}", 2);

        let text = capture.0.lock().unwrap();
        assert!(text.contains("[ERROR] erep: doorbell 0x2\n"));
    }
}

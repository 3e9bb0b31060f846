//! Thread-local controller logging context.
//!
//! This module provides the `alog!()` macro which lets the manager and
//! controller code log without passing a handle around. The manager sets the
//! current controller context before each lifecycle or update call and clears
//! it afterwards, so every line is attributed to the controller that produced
//! it.

use std::cell::RefCell;
use std::io::Write;
use std::time::Instant;

use colored::Colorize;

thread_local! {
    static CURRENT_CONTROLLER: RefCell<Option<ControllerLogContext>> = const { RefCell::new(None) };
}

/// Log severity handled by `alog!`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}

/// Thread-local context for controller logging.
pub struct ControllerLogContext {
    /// The controller's name for log attribution.
    pub name: String,
    /// When the current cycle started (for timing info).
    pub cycle_start: Option<Instant>,
    /// Current manager cycle number.
    pub cycle_number: u64,
}

/// Set the current controller context for this thread.
/// Called by the manager before invoking controller lifecycle methods.
pub fn set_controller_context(name: &str, cycle_number: u64) {
    CURRENT_CONTROLLER.with(|ctx| {
        *ctx.borrow_mut() = Some(ControllerLogContext {
            name: name.to_string(),
            cycle_start: Some(Instant::now()),
            cycle_number,
        });
    });
}

/// Clear the current controller context for this thread.
/// Called by the manager after controller lifecycle methods complete.
pub fn clear_controller_context() {
    CURRENT_CONTROLLER.with(|ctx| *ctx.borrow_mut() = None);
}

/// Get the current controller name if set, otherwise "manager".
pub fn current_controller_name() -> String {
    CURRENT_CONTROLLER.with(|ctx| {
        ctx.borrow()
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "manager".to_string())
    })
}

/// Get the current cycle number if set, otherwise 0.
pub fn current_cycle_number() -> u64 {
    CURRENT_CONTROLLER.with(|ctx| ctx.borrow().as_ref().map(|c| c.cycle_number).unwrap_or(0))
}

/// Internal function used by the alog!() macro.
/// Logs a message with the current controller context.
pub fn log_with_context(level: LogLevel, message: String) {
    let source = current_controller_name();
    let tag = format!("[{}]", source).yellow();

    match level {
        LogLevel::Info => {
            let line = format!("{} {} {}\n", "[INFO]".blue(), tag, message);
            let _ = std::io::stderr().write_all(line.as_bytes());
            let _ = std::io::stderr().flush();
        }
        LogLevel::Warning => {
            let line = format!("{} {} {}\n", "[WARN]".yellow(), tag, message);
            let _ = std::io::stdout().write_all(line.as_bytes());
            let _ = std::io::stdout().flush();
        }
        LogLevel::Error => {
            let line = format!("{} {} {}\n", "[ERROR]".red(), tag, message);
            let _ = std::io::stdout().write_all(line.as_bytes());
            let _ = std::io::stdout().flush();
        }
        LogLevel::Debug => {
            let line = format!("{} {} {}\n", "[DEBUG]".bright_black(), tag, message);
            let _ = std::io::stdout().write_all(line.as_bytes());
            let _ = std::io::stdout().flush();
        }
    }
}

/// Log a message attributed to the current controller context.
///
/// # Syntax
///
/// ```ignore
/// alog!(info, "Simple message");
/// alog!(warn, "Warning with value: {}", value);
/// alog!(error, "Error: {}", err);
/// alog!(debug, "Debug info: {:?}", data);
/// ```
#[macro_export]
macro_rules! alog {
    (info, $($arg:tt)*) => {
        $crate::core::alog::log_with_context($crate::core::alog::LogLevel::Info, format!($($arg)*))
    };
    (warn, $($arg:tt)*) => {
        $crate::core::alog::log_with_context($crate::core::alog::LogLevel::Warning, format!($($arg)*))
    };
    (error, $($arg:tt)*) => {
        $crate::core::alog::log_with_context($crate::core::alog::LogLevel::Error, format!($($arg)*))
    };
    (debug, $($arg:tt)*) => {
        $crate::core::alog::log_with_context($crate::core::alog::LogLevel::Debug, format!($($arg)*))
    };
}

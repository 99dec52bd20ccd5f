#![deny(missing_docs)]
//! Shared logging utilities for the image proxy workspace.
//!
//! This crate provides the `proxy_*` logging macros used across the codebase,
//! the runtime debug switch behind `proxy_debug!`, and a minimal test
//! initializer for the global logger.

use std::cell::Cell;

thread_local! {
    /// Thread-local switch mirroring the `debug` configuration toggle.
    static DEBUG_ENABLED: Cell<bool> = const { Cell::new(false) };
}

/// Enables or disables `proxy_debug!` output for the current thread.
///
/// The engine calls this once during installation with the configured value.
pub fn set_debug_enabled(enabled: bool) {
    DEBUG_ENABLED.with(|v| v.set(enabled));
}

/// Reports whether `proxy_debug!` output is enabled for the current thread.
pub fn debug_enabled() -> bool {
    DEBUG_ENABLED.with(|v| v.get())
}

/// Shortens a URL for log lines, keeping the first 50 characters.
pub fn abbreviate(url: &str) -> String {
    const LIMIT: usize = 50;
    match url.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &url[..cut]),
        None => url.to_string(),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! proxy_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! proxy_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message, but only while the debug switch is on.
#[macro_export]
macro_rules! proxy_debug {
    ($($arg:tt)*) => {{
        if $crate::debug_enabled() {
            log::debug!($($arg)*);
        }
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! proxy_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! proxy_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
    set_debug_enabled(true);
}

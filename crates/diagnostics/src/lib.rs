//! Logging facade shared by the blobfs crates
//!
//! All crates log through the macros below so that one environment variable
//! controls the whole process:
//!
//! - `BLOBFS_LOG=off` (default) - no logs
//! - `BLOBFS_LOG=error` / `warn` - problems only
//! - `BLOBFS_LOG=info` - mutations and session setup
//! - `BLOBFS_LOG=debug` - every command, cache hit and miss

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`]
pub const LOG_ENV: &str = "BLOBFS_LOG";

static INIT: Once = Once::new();

/// Level selected by the `BLOBFS_LOG` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSetting {
    Off,
    Level(emit::Level),
    /// Unrecognized value; treated as info
    Unknown,
}

/// Map a `BLOBFS_LOG` value onto a setting. Matching is case-insensitive.
pub fn parse_setting(value: &str) -> LogSetting {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" => LogSetting::Off,
        "debug" => LogSetting::Level(emit::Level::Debug),
        "info" => LogSetting::Level(emit::Level::Info),
        "warn" => LogSetting::Level(emit::Level::Warn),
        "error" => LogSetting::Level(emit::Level::Error),
        _ => LogSetting::Unknown,
    }
}

/// Initialize diagnostics based on the BLOBFS_LOG environment variable
///
/// Call once at startup. Subsequent calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let value = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());

        let level = match parse_setting(&value) {
            LogSetting::Off => return,
            LogSetting::Level(level) => level,
            LogSetting::Unknown => {
                // Bootstrap warning, emitted before any sink exists
                eprintln!("Warning: Unknown {LOG_ENV} value '{value}', using 'info'");
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime must outlive every emitting thread.
        std::mem::forget(rt);
    });
}

/// Log basic operations (connections, mutations)
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (commands, cache hits, backend round trips)
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log warning conditions (fallbacks, recoverable errors)
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort a command
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
        init();
    }

    #[test]
    fn test_parse_setting() {
        assert_eq!(parse_setting("off"), LogSetting::Off);
        assert_eq!(parse_setting(""), LogSetting::Off);
        assert_eq!(parse_setting("DEBUG"), LogSetting::Level(emit::Level::Debug));
        assert_eq!(parse_setting(" warn "), LogSetting::Level(emit::Level::Warn));
        assert_eq!(parse_setting("error"), LogSetting::Level(emit::Level::Error));
        assert_eq!(parse_setting("verbose"), LogSetting::Unknown);
    }

    #[test]
    fn test_macros_compile() {
        log_info!("Test message");
        log_debug!("Debug message with {value}", value: 42);
        log_warn!("Warning message");
        log_error!("Error message");
    }
}

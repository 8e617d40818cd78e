//! Controller logging.
//!
//! With the `logwise` feature enabled, messages are recorded through logwise so they land
//! wherever the host has pointed its loggers. Otherwise they are written to stderr, which
//! keeps them out of stdout in hosts that use it for their own output.

/// Logs a routine lifecycle event.
pub(crate) fn log(message: &str) {
    #[cfg(feature = "logwise")]
    {
        logwise::info_sync!("dpictl: {message}", message = logwise::privacy::LogIt(message));
    }
    #[cfg(not(feature = "logwise"))]
    {
        eprintln!("dpictl: {}", message);
    }
}

/// Logs an anomaly the controller recovered from.
pub(crate) fn warn(message: &str) {
    #[cfg(feature = "logwise")]
    {
        logwise::warn_sync!("dpictl: {message}", message = logwise::privacy::LogIt(message));
    }
    #[cfg(not(feature = "logwise"))]
    {
        eprintln!("dpictl: warning: {}", message);
    }
}

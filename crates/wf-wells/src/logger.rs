//! Deferred logging.
//!
//! Messages produced while wells are processed (possibly on worker threads or
//! on several processes) are collected here and emitted in one place through
//! `tracing` once the caller decides it is safe to do so.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Note,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Note => "note",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Message category, e.g. `NOT_SUPPORTING_POTN`
    pub tag: Option<String>,
    pub message: String,
}

/// Ordered collection of log entries.
#[derive(Clone, Debug, Default)]
pub struct DeferredLogger {
    entries: Vec<LogEntry>,
}

impl DeferredLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, level: LogLevel, tag: Option<&str>, message: impl Into<String>) {
        self.entries.push(LogEntry {
            level,
            tag: tag.map(str::to_owned),
            message: message.into(),
        });
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Debug, None, message);
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Note, None, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, None, message);
    }

    pub fn warning(&mut self, tag: &str, message: impl Into<String>) {
        self.push(LogLevel::Warning, Some(tag), message);
    }

    pub fn error(&mut self, tag: &str, message: impl Into<String>) {
        self.push(LogLevel::Error, Some(tag), message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.entries.iter().any(|e| e.tag.as_deref() == Some(tag))
    }

    /// Append the entries of another logger, preserving their order.
    pub fn extend(&mut self, other: DeferredLogger) {
        self.entries.extend(other.entries);
    }

    /// Emit all entries through `tracing` and clear the logger.
    ///
    /// With `terminal_output == false` the entries are dropped silently, which
    /// is what non-output processes do.
    pub fn flush(&mut self, terminal_output: bool) {
        let entries = std::mem::take(&mut self.entries);
        if !terminal_output {
            return;
        }
        for entry in entries {
            let tag = entry.tag.as_deref().unwrap_or("");
            match entry.level {
                LogLevel::Debug => tracing::debug!(tag, "{}", entry.message),
                LogLevel::Note | LogLevel::Info => tracing::info!(tag, "{}", entry.message),
                LogLevel::Warning => tracing::warn!(tag, "{}", entry.message),
                LogLevel::Error => tracing::error!(tag, "{}", entry.message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_preserves_order() {
        let mut a = DeferredLogger::new();
        a.info("first");
        let mut b = DeferredLogger::new();
        b.warning("NOT_SUPPORTING_POTN", "second");
        a.extend(b);
        let msgs: Vec<_> = a.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(msgs, vec!["first", "second"]);
        assert!(a.has_tag("NOT_SUPPORTING_POTN"));
    }

    #[test]
    fn flush_clears() {
        let mut log = DeferredLogger::new();
        log.note("Iter W-FLUX(oil)");
        log.flush(false);
        assert!(log.is_empty());
    }
}

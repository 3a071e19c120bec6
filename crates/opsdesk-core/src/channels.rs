//! Named log channels.
//!
//! Every channel maps to a `tracing` target. The logging setup routes each
//! target to its own daily-rotated file with the retention listed here, so
//! emitting on a channel is just `warn!(target: LogChannel::Security.target(), ...)`
//! or, with a literal, `warn!(target: "security", ...)`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogChannel {
    /// Default daily sink for anything not routed elsewhere.
    App,
    Auth,
    Api,
    Database,
    Security,
    Audit,
    Financial,
}

impl LogChannel {
    pub const ALL: [LogChannel; 7] = [
        LogChannel::App,
        LogChannel::Auth,
        LogChannel::Api,
        LogChannel::Database,
        LogChannel::Security,
        LogChannel::Audit,
        LogChannel::Financial,
    ];

    /// The `tracing` target events on this channel are emitted with.
    pub const fn target(self) -> &'static str {
        match self {
            LogChannel::App => "app",
            LogChannel::Auth => "auth",
            LogChannel::Api => "api",
            LogChannel::Database => "database",
            LogChannel::Security => "security",
            LogChannel::Audit => "audit",
            LogChannel::Financial => "financial",
        }
    }

    /// Number of daily files kept before rotation deletes the oldest.
    pub const fn retention_days(self) -> usize {
        match self {
            LogChannel::Security | LogChannel::Financial | LogChannel::Audit => 90,
            LogChannel::Auth | LogChannel::Database => 30,
            LogChannel::Api | LogChannel::App => 14,
        }
    }
}

impl fmt::Display for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_are_unique() {
        let mut targets: Vec<_> = LogChannel::ALL.iter().map(|c| c.target()).collect();
        targets.sort_unstable();
        targets.dedup();
        assert_eq!(targets.len(), LogChannel::ALL.len());
    }

    #[test]
    fn test_security_and_financial_keep_ninety_days() {
        assert_eq!(LogChannel::Security.retention_days(), 90);
        assert_eq!(LogChannel::Financial.retention_days(), 90);
        assert_eq!(LogChannel::Api.retention_days(), 14);
    }
}

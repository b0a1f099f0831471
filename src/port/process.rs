//! Process-table introspection port.

use std::time::Duration;

/// A process visible on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Command line with arguments joined by spaces.
    pub command_line: String,
    /// Parent process id, when known.
    pub parent_pid: Option<u32>,
    /// Time since the process started, when known.
    pub age: Option<Duration>,
}

impl ProcessInfo {
    /// True when the command line mentions `command`.
    #[must_use]
    pub fn runs(&self, command: &str) -> bool {
        !command.is_empty() && self.command_line.contains(command)
    }
}

/// Best-effort host process introspection.
///
/// Every method degrades instead of failing: lookups that the platform does
/// not allow return `None` or an empty list.
pub trait ProcessInspector: Send + Sync {
    /// The process listening on `port`, if it can be identified.
    fn port_owner(&self, port: u16) -> Option<ProcessInfo>;

    /// All processes visible to the orchestrator.
    fn processes(&self) -> Vec<ProcessInfo>;

    /// Ask `pid` to stop gracefully. Returns false if the signal was not delivered.
    fn terminate(&self, pid: u32) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_matches_substring_of_command_line() {
        let info = ProcessInfo {
            pid: 42,
            command_line: "/usr/bin/gunicorn --bind 0.0.0.0:3000 app:app".into(),
            parent_pid: Some(1),
            age: None,
        };
        assert!(info.runs("gunicorn"));
        assert!(!info.runs("postgres"));
        assert!(!info.runs(""));
    }
}

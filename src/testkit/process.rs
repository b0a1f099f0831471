//! Fake process inspector.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::port::{ProcessInfo, ProcessInspector};

/// Build a [`ProcessInfo`] whose parent is init.
#[must_use]
pub fn process(pid: u32, command_line: &str, age_secs: Option<u64>) -> ProcessInfo {
    child_process(pid, 1, command_line, age_secs)
}

/// Build a [`ProcessInfo`] forked from `parent_pid`.
#[must_use]
pub fn child_process(
    pid: u32,
    parent_pid: u32,
    command_line: &str,
    age_secs: Option<u64>,
) -> ProcessInfo {
    ProcessInfo {
        pid,
        command_line: command_line.to_string(),
        parent_pid: Some(parent_pid),
        age: age_secs.map(Duration::from_secs),
    }
}

/// Inspector with configurable answers that records terminations.
#[derive(Debug, Default)]
pub struct FakeInspector {
    owners: Mutex<HashMap<u16, ProcessInfo>>,
    processes: Mutex<Vec<ProcessInfo>>,
    terminated: Mutex<Vec<u32>>,
}

impl FakeInspector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_owner(self, port: u16, owner: ProcessInfo) -> Self {
        self.owners.lock().insert(port, owner);
        self
    }

    #[must_use]
    pub fn with_processes(self, processes: Vec<ProcessInfo>) -> Self {
        *self.processes.lock() = processes;
        self
    }

    /// Pids passed to [`ProcessInspector::terminate`], in order.
    #[must_use]
    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.lock().clone()
    }
}

impl ProcessInspector for FakeInspector {
    fn port_owner(&self, port: u16) -> Option<ProcessInfo> {
        self.owners.lock().get(&port).cloned()
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        self.processes.lock().clone()
    }

    fn terminate(&self, pid: u32) -> bool {
        self.terminated.lock().push(pid);
        true
    }
}

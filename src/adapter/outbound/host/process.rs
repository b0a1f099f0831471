//! Process-table and socket introspection through procfs.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::application::launcher::request_graceful_stop;
use crate::port::{ProcessInfo, ProcessInspector};

/// TCP state code for LISTEN in `/proc/net/tcp`.
const TCP_LISTEN: &str = "0A";

/// Socket inodes listening on `port` in a `/proc/net/tcp{,6}` table.
#[must_use]
pub fn parse_listening_inodes(table: &str, port: u16) -> Vec<u64> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let local = fields.get(1)?;
            let state = fields.get(3)?;
            let inode = fields.get(9)?;
            if *state != TCP_LISTEN {
                return None;
            }
            let (_, hex_port) = local.rsplit_once(':')?;
            let local_port = u16::from_str_radix(hex_port, 16).ok()?;
            if local_port != port {
                return None;
            }
            inode.parse().ok().filter(|inode| *inode != 0)
        })
        .collect()
}

/// Fields of `/proc/<pid>/stat` following the command name, starting at the state.
fn stat_fields(stat: &str) -> Option<std::str::SplitWhitespace<'_>> {
    // The command name may contain spaces and parentheses; fields resume after the last ')'.
    let (_, rest) = stat.rsplit_once(')')?;
    Some(rest.split_whitespace())
}

/// Start time in clock ticks since boot, from `/proc/<pid>/stat`.
#[must_use]
pub fn parse_start_ticks(stat: &str) -> Option<u64> {
    stat_fields(stat)?.nth(19)?.parse().ok()
}

/// Parent pid, from `/proc/<pid>/stat`.
#[must_use]
pub fn parse_parent_pid(stat: &str) -> Option<u32> {
    stat_fields(stat)?.nth(1)?.parse().ok()
}

/// Best-effort inspector over a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcfsInspector {
    proc_root: PathBuf,
}

impl Default for ProcfsInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsInspector {
    #[must_use]
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    #[must_use]
    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn pids(&self) -> Vec<u32> {
        let Ok(entries) = std::fs::read_dir(&self.proc_root) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect()
    }

    fn uptime(&self) -> Option<f64> {
        std::fs::read_to_string(self.proc_root.join("uptime"))
            .ok()?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    fn info(&self, pid: u32, uptime: Option<f64>) -> Option<ProcessInfo> {
        let dir = self.proc_root.join(pid.to_string());
        let raw = std::fs::read(dir.join("cmdline")).ok()?;
        let command_line = raw
            .split(|b| *b == 0)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        if command_line.is_empty() {
            // Kernel threads have no command line.
            return None;
        }

        let stat = std::fs::read_to_string(dir.join("stat")).ok();
        let parent_pid = stat.as_deref().and_then(parse_parent_pid);
        let age = uptime.zip(stat.as_deref()).and_then(|(uptime, stat)| {
            let started = parse_start_ticks(stat)? as f64 / clock_ticks_per_second();
            (uptime >= started).then(|| Duration::from_secs_f64(uptime - started))
        });

        Some(ProcessInfo {
            pid,
            command_line,
            parent_pid,
            age,
        })
    }

    fn owns_socket(&self, pid: u32, inodes: &[u64]) -> bool {
        let Ok(fds) = std::fs::read_dir(self.proc_root.join(pid.to_string()).join("fd")) else {
            return false;
        };
        fds.filter_map(|fd| fd.ok())
            .filter_map(|fd| std::fs::read_link(fd.path()).ok())
            .filter_map(|target| {
                let target = target.to_str()?.to_string();
                target
                    .strip_prefix("socket:[")?
                    .strip_suffix(']')?
                    .parse::<u64>()
                    .ok()
            })
            .any(|inode| inodes.contains(&inode))
    }
}

#[cfg(unix)]
fn clock_ticks_per_second() -> f64 {
    // SAFETY: sysconf has no side effects for this query.
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if hz > 0 {
        hz as f64
    } else {
        100.0
    }
}

#[cfg(not(unix))]
fn clock_ticks_per_second() -> f64 {
    100.0
}

impl ProcessInspector for ProcfsInspector {
    fn port_owner(&self, port: u16) -> Option<ProcessInfo> {
        let inodes: Vec<u64> = ["net/tcp", "net/tcp6"]
            .iter()
            .filter_map(|table| std::fs::read_to_string(self.proc_root.join(table)).ok())
            .flat_map(|table| parse_listening_inodes(&table, port))
            .collect();
        if inodes.is_empty() {
            debug!(port, "No listening socket found");
            return None;
        }

        let uptime = self.uptime();
        // Sockets of other users' processes are unreadable without privileges.
        let owner = self
            .pids()
            .into_iter()
            .find(|pid| self.owns_socket(*pid, &inodes))?;
        self.info(owner, uptime)
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        let uptime = self.uptime();
        self.pids()
            .into_iter()
            .filter_map(|pid| self.info(pid, uptime))
            .collect()
    }

    fn terminate(&self, pid: u32) -> bool {
        request_graceful_stop(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
   0: 00000000:0BB8 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 424242 1 0000000000000000 100 0 0 10 0\n\
   1: 0100007F:0BB9 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 515151 1 0000000000000000 100 0 0 10 0\n\
   2: 0100007F:0BB8 0100007F:D2F0 01 00000000:00000000 00:00000000 00000000  1000        0 616161 1 0000000000000000 20 4 30 10 -1\n";

    #[test]
    fn listening_inodes_match_port_and_state() {
        assert_eq!(parse_listening_inodes(TCP, 3000), vec![424_242]);
        assert_eq!(parse_listening_inodes(TCP, 3001), vec![515_151]);
        assert!(parse_listening_inodes(TCP, 3002).is_empty());
    }

    #[test]
    fn start_ticks_skip_command_with_spaces() {
        let stat = "1234 (gunicorn: worker (x)) S 1 1234 1234 0 -1 4194560 100 0 0 0 5 2 0 0 20 0 1 0 987654 1000000 200";
        assert_eq!(parse_start_ticks(stat), Some(987_654));
        assert_eq!(parse_parent_pid(stat), Some(1));
        assert_eq!(parse_start_ticks("garbage"), None);
        assert_eq!(parse_parent_pid("garbage"), None);
    }

    #[test]
    fn processes_read_from_fake_root() {
        let root = tempfile::tempdir().unwrap();
        let pid_dir = root.path().join("77");
        std::fs::create_dir_all(&pid_dir).unwrap();
        std::fs::write(pid_dir.join("cmdline"), b"gunicorn\0--bind\00.0.0.0:3000\0").unwrap();
        std::fs::write(
            pid_dir.join("stat"),
            "77 (gunicorn) S 1 77 77 0 -1 0 0 0 0 0 0 0 0 0 20 0 1 0 1000 0 0",
        )
        .unwrap();
        std::fs::write(root.path().join("uptime"), "5000.00 100.00\n").unwrap();
        // Kernel thread: empty command line.
        std::fs::create_dir_all(root.path().join("2")).unwrap();
        std::fs::write(root.path().join("2/cmdline"), b"").unwrap();

        let inspector = ProcfsInspector::with_root(root.path());
        let processes = inspector.processes();
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].pid, 77);
        assert_eq!(processes[0].command_line, "gunicorn --bind 0.0.0.0:3000");
        assert_eq!(processes[0].parent_pid, Some(1));
        assert!(processes[0].age.is_some());
    }

    #[test]
    fn unknown_port_has_no_owner() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("net")).unwrap();
        std::fs::write(root.path().join("net/tcp"), TCP).unwrap();
        let inspector = ProcfsInspector::with_root(root.path());
        assert!(inspector.port_owner(3005).is_none());
    }
}

//! Host telemetry read from procfs and sysfs.
//!
//! Each metric is read independently. A missing file or an unparsable line
//! leaves that one field `None`; the rest of the snapshot is still filled.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use crate::domain::{NetworkCounters, TelemetrySnapshot};
use crate::port::TelemetrySource;

/// Aggregate CPU jiffies from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    /// Idle plus I/O wait.
    pub idle: u64,
    pub iowait: u64,
}

impl CpuTimes {
    /// Busy and I/O-wait percentages between `earlier` and `self`.
    #[must_use]
    pub fn percentages_since(&self, earlier: &Self) -> Option<(f64, f64)> {
        let total = self.total.checked_sub(earlier.total)?;
        if total == 0 {
            return None;
        }
        let idle = self.idle.saturating_sub(earlier.idle);
        let iowait = self.iowait.saturating_sub(earlier.iowait);
        let total = total as f64;
        let busy = (total - idle as f64).max(0.0) / total * 100.0;
        Some((busy, iowait as f64 / total * 100.0))
    }
}

/// Parse the aggregate `cpu` line.
#[must_use]
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find_map(|l| l.strip_prefix("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    // user nice system idle iowait irq softirq steal; guest time is already in user.
    let total: u64 = fields.iter().take(8).sum();
    let iowait = fields.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        total,
        idle: fields[3] + iowait,
        iowait,
    })
}

/// The `/proc/meminfo` fields the snapshot needs, in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub available_kb: u64,
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
}

impl MemInfo {
    #[must_use]
    pub fn pressure_percent(&self) -> Option<f64> {
        if self.total_kb == 0 {
            return None;
        }
        let used = self.total_kb.saturating_sub(self.available_kb);
        Some(used as f64 / self.total_kb as f64 * 100.0)
    }

    #[must_use]
    pub const fn available_mb(&self) -> u64 {
        self.available_kb / 1024
    }

    /// Used swap share; zero when no swap is configured.
    #[must_use]
    pub fn swap_percent(&self) -> f64 {
        if self.swap_total_kb == 0 {
            return 0.0;
        }
        let used = self.swap_total_kb.saturating_sub(self.swap_free_kb);
        used as f64 / self.swap_total_kb as f64 * 100.0
    }
}

/// Parse `/proc/meminfo`. `MemTotal` and `MemAvailable` are required.
#[must_use]
pub fn parse_meminfo(content: &str) -> Option<MemInfo> {
    let mut fields = BTreeMap::new();
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        if let Some(value) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()) {
            fields.insert(key.trim(), value);
        }
    }
    Some(MemInfo {
        total_kb: *fields.get("MemTotal")?,
        available_kb: *fields.get("MemAvailable")?,
        swap_total_kb: fields.get("SwapTotal").copied().unwrap_or(0),
        swap_free_kb: fields.get("SwapFree").copied().unwrap_or(0),
    })
}

/// Parse `/proc/net/dev` into per-interface counters.
#[must_use]
pub fn parse_net_dev(content: &str) -> BTreeMap<String, NetworkCounters> {
    content
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (iface, stats) = line.split_once(':')?;
            let fields: Vec<u64> = stats
                .split_whitespace()
                .filter_map(|s| s.parse().ok())
                .collect();
            if fields.len() < 16 {
                return None;
            }
            Some((
                iface.trim().to_string(),
                NetworkCounters {
                    bytes_received: fields[0],
                    packets_received: fields[1],
                    bytes_sent: fields[8],
                    packets_sent: fields[9],
                },
            ))
        })
        .collect()
}

/// Parse a sysfs thermal reading in millidegrees Celsius.
#[must_use]
pub fn parse_millidegrees(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().map(|m| m / 1000.0)
}

/// Telemetry from the local Linux host.
#[derive(Debug, Clone)]
pub struct HostTelemetry {
    proc_root: PathBuf,
    sys_root: PathBuf,
    disk_path: PathBuf,
    cpu_window: Duration,
}

impl HostTelemetry {
    /// Read the real `/proc` and `/sys`; disk usage is for the filesystem holding `disk_path`.
    #[must_use]
    pub fn new(disk_path: impl Into<PathBuf>, cpu_window: Duration) -> Self {
        Self::with_roots("/proc", "/sys", disk_path, cpu_window)
    }

    #[must_use]
    pub fn with_roots(
        proc_root: impl Into<PathBuf>,
        sys_root: impl Into<PathBuf>,
        disk_path: impl Into<PathBuf>,
        cpu_window: Duration,
    ) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            disk_path: disk_path.into(),
            cpu_window,
        }
    }

    fn read(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.proc_root.join(relative)).ok()
    }

    fn cpu(&self) -> Option<(f64, f64)> {
        let first = parse_cpu_times(&self.read("stat")?)?;
        std::thread::sleep(self.cpu_window);
        let second = parse_cpu_times(&self.read("stat")?)?;
        second.percentages_since(&first)
    }

    fn memory(&self) -> Option<MemInfo> {
        parse_meminfo(&self.read("meminfo")?)
    }

    fn temperature(&self) -> Option<f64> {
        let entries = std::fs::read_dir(self.sys_root.join("class/thermal")).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with("thermal_zone"))
            })
            .filter_map(|entry| std::fs::read_to_string(entry.path().join("temp")).ok())
            .filter_map(|raw| parse_millidegrees(&raw))
            .reduce(f64::max)
    }

    fn network(&self) -> Option<BTreeMap<String, NetworkCounters>> {
        let counters = parse_net_dev(&self.read("net/dev")?);
        (!counters.is_empty()).then_some(counters)
    }

    fn process_count(&self) -> Option<u32> {
        let entries = std::fs::read_dir(&self.proc_root).ok()?;
        let count = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.bytes().all(|b| b.is_ascii_digit()))
            })
            .count();
        u32::try_from(count).ok()
    }
}

/// Used share of the filesystem holding `path`, as `df` reports it.
#[cfg(unix)]
fn disk_usage_percent(path: &Path) -> Option<f64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    // SAFETY: statvfs is plain old data; zeroed is a valid initial value.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: c_path is NUL-terminated and stat points to writable memory.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }
    let used = (stat.f_blocks as u64).saturating_sub(stat.f_bfree as u64);
    let usable = used + stat.f_bavail as u64;
    if usable == 0 {
        return None;
    }
    Some(used as f64 / usable as f64 * 100.0)
}

#[cfg(not(unix))]
fn disk_usage_percent(_path: &Path) -> Option<f64> {
    None
}

fn note_missing<T>(metric: &'static str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        warn!(metric, "Telemetry metric unavailable");
    }
    value
}

impl TelemetrySource for HostTelemetry {
    fn sample(&self) -> TelemetrySnapshot {
        let cpu = note_missing("cpu_usage", self.cpu());
        let memory = note_missing("memory", self.memory());

        TelemetrySnapshot {
            sampled_at: Utc::now(),
            cpu_usage_percent: cpu.map(|(busy, _)| busy),
            io_wait_percent: cpu.map(|(_, iowait)| iowait),
            memory_pressure_percent: memory.and_then(|m| m.pressure_percent()),
            available_memory_mb: memory.map(|m| m.available_mb()),
            swap_percent: memory.map(|m| m.swap_percent()),
            disk_usage_percent: note_missing("disk_usage", disk_usage_percent(&self.disk_path)),
            // Many hosts have no thermal sensor; absence is not worth a warning.
            temperature_celsius: self.temperature(),
            network: note_missing("network", self.network()),
            process_count: note_missing("process_count", self.process_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  100 0 50 800 50 0 0 0 0 0\ncpu0 50 0 25 400 25 0 0 0 0 0\nintr 1\n";

    const MEMINFO: &str = "MemTotal:        2048000 kB\n\
MemFree:          100000 kB\n\
MemAvailable:     512000 kB\n\
SwapTotal:       1000000 kB\n\
SwapFree:         250000 kB\n";

    const NET_DEV: &str = "Inter-|   Receive                                                |  Transmit\n \
face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n    \
lo:    1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0\n  \
eth0:  500000    400    0    0    0     0          0         0   250000     300    0    0    0     0       0          0\n";

    #[test]
    fn cpu_line_parses_and_diffs() {
        let first = parse_cpu_times(STAT).unwrap();
        assert_eq!(first.total, 1000);
        assert_eq!(first.idle, 850);
        assert_eq!(first.iowait, 50);

        let second = CpuTimes {
            total: first.total + 200,
            idle: first.idle + 100,
            iowait: first.iowait + 20,
        };
        let (busy, iowait) = second.percentages_since(&first).unwrap();
        assert!((busy - 50.0).abs() < 1e-9);
        assert!((iowait - 10.0).abs() < 1e-9);
        assert!(first.percentages_since(&first).is_none());
    }

    #[test]
    fn meminfo_derives_pressure_and_swap() {
        let mem = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(mem.available_mb(), 500);
        assert!((mem.pressure_percent().unwrap() - 75.0).abs() < 1e-9);
        assert!((mem.swap_percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn meminfo_without_swap_reports_zero() {
        let mem = parse_meminfo("MemTotal: 1000 kB\nMemAvailable: 500 kB\n").unwrap();
        assert_eq!(mem.swap_percent(), 0.0);
        assert!(parse_meminfo("MemTotal: 1000 kB\n").is_none());
    }

    #[test]
    fn net_dev_reads_each_interface() {
        let counters = parse_net_dev(NET_DEV);
        assert_eq!(counters.len(), 2);
        assert_eq!(counters["eth0"].bytes_received, 500_000);
        assert_eq!(counters["eth0"].packets_sent, 300);
    }

    #[test]
    fn thermal_reading_in_millidegrees() {
        assert_eq!(parse_millidegrees("45000\n"), Some(45.0));
        assert_eq!(parse_millidegrees("n/a"), None);
    }

    #[test]
    fn fake_roots_fill_what_exists_and_leave_the_rest_absent() {
        let root = tempfile::tempdir().unwrap();
        let proc_root = root.path().join("proc");
        let sys_root = root.path().join("sys");
        std::fs::create_dir_all(proc_root.join("net")).unwrap();
        std::fs::create_dir_all(proc_root.join("1")).unwrap();
        std::fs::create_dir_all(proc_root.join("42")).unwrap();
        std::fs::create_dir_all(sys_root.join("class/thermal/thermal_zone0")).unwrap();
        std::fs::create_dir_all(sys_root.join("class/thermal/thermal_zone1")).unwrap();
        std::fs::write(proc_root.join("meminfo"), MEMINFO).unwrap();
        std::fs::write(proc_root.join("net/dev"), NET_DEV).unwrap();
        std::fs::write(sys_root.join("class/thermal/thermal_zone0/temp"), "41000").unwrap();
        std::fs::write(sys_root.join("class/thermal/thermal_zone1/temp"), "63500").unwrap();

        let telemetry =
            HostTelemetry::with_roots(&proc_root, &sys_root, root.path(), Duration::ZERO);
        let snapshot = telemetry.sample();

        // No /proc/stat in the fake root.
        assert_eq!(snapshot.cpu_usage_percent, None);
        assert_eq!(snapshot.io_wait_percent, None);
        assert_eq!(snapshot.available_memory_mb, Some(500));
        assert_eq!(snapshot.temperature_celsius, Some(63.5));
        assert_eq!(snapshot.process_count, Some(2));
        assert!(snapshot.network.is_some());
        assert!(snapshot.disk_usage_percent.is_some());
    }
}

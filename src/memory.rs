//! Peak resident-memory tracking for ingestion reports.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(target_os = "linux")]
use procfs::process::Process;

/// Current resident set size of this process; `None` off Linux.
pub fn resident_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = Process::myself().ok()?.status().ok()?;
        status.vmrss.map(|kib| kib * 1024)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Highest RSS observed across `update` calls, shared between workers.
#[derive(Debug, Default)]
pub struct PeakMemory {
    peak: AtomicU64,
}

impl PeakMemory {
    pub fn new() -> Self {
        let tracker = PeakMemory::default();
        tracker.update();
        tracker
    }

    pub fn update(&self) {
        if let Some(current_mem) = resident_bytes() {
            self.peak.fetch_max(current_mem, Ordering::Relaxed);
        }
    }

    pub fn peak_bytes(&self) -> Option<u64> {
        let peak = self.peak.load(Ordering::Relaxed);
        if peak > 0 {
            Some(peak)
        } else {
            None
        }
    }
}

/// Byte count shown with binary units, e.g. `1.50 MiB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

        if self.0 < 1024 {
            return write!(f, "{} B", self.0);
        }
        let mut value = self.0 as f64 / 1024.0;
        let mut unit = 0;
        while value >= 1024.0 && unit + 1 < UNITS.len() {
            value /= 1024.0;
            unit += 1;
        }
        write!(f, "{:.2} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes_use_binary_units() {
        assert_eq!(ByteSize(0).to_string(), "0 B");
        assert_eq!(ByteSize(1023).to_string(), "1023 B");
        assert_eq!(ByteSize(1536).to_string(), "1.50 KiB");
        assert_eq!(ByteSize(3 * 1024 * 1024).to_string(), "3.00 MiB");
        assert_eq!(ByteSize(5 << 50).to_string(), "5120.00 TiB");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn peak_is_recorded_on_linux() {
        let tracker = PeakMemory::new();
        tracker.update();
        assert!(tracker.peak_bytes().unwrap() > 0);
    }
}

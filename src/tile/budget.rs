//! Cache sizing from the process memory ceiling.
//!
//! The tile cache gets a fixed fraction of the memory the process may use,
//! computed once when a source is attached.

use tracing::info;

/// The cache gets `1 / DEFAULT_CACHE_FRACTION` of the memory ceiling.
pub const DEFAULT_CACHE_FRACTION: u64 = 4;

/// Fallback ceiling when nothing can be detected: 8GB
const FALLBACK_MEMORY_CEILING: u64 = 8 * 1024 * 1024 * 1024;

/// Cache capacity in kilobytes for a given ceiling, rounded down.
///
/// A `fraction` of 0 is treated as 1.
pub fn cache_capacity_kb(ceiling_bytes: u64, fraction: u64) -> usize {
    let kb = ceiling_bytes / 1024 / fraction.max(1);
    usize::try_from(kb).unwrap_or(usize::MAX)
}

/// Cache capacity in kilobytes using the detected ceiling and the default fraction.
pub fn default_cache_capacity_kb() -> usize {
    let ceiling = memory_ceiling_bytes();
    let capacity_kb = cache_capacity_kb(ceiling, DEFAULT_CACHE_FRACTION);
    info!(
        "Memory ceiling {} MB, tile cache {} MB",
        ceiling / (1024 * 1024),
        capacity_kb / 1024
    );
    capacity_kb
}

/// The memory the process may use, in bytes.
///
/// On Linux this is the cgroup v2 `memory.max` limit if one is set, else
/// `MemTotal` from `/proc/meminfo`. Other platforms use an 8GB fallback.
#[cfg(target_os = "linux")]
pub fn memory_ceiling_bytes() -> u64 {
    use std::fs;

    let total = fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|content| parse_meminfo_total(&content));
    let limit = fs::read_to_string("/sys/fs/cgroup/memory.max")
        .ok()
        .and_then(|content| parse_cgroup_limit(&content));

    match (limit, total) {
        (Some(limit), Some(total)) => limit.min(total),
        (Some(limit), None) => limit,
        (None, Some(total)) => total,
        (None, None) => FALLBACK_MEMORY_CEILING,
    }
}

#[cfg(not(target_os = "linux"))]
pub fn memory_ceiling_bytes() -> u64 {
    FALLBACK_MEMORY_CEILING
}

/// Parse `MemTotal` from `/proc/meminfo` into bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo_total(content: &str) -> Option<u64> {
    // Format: "MemTotal:       16384000 kB"
    content
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

/// Parse a cgroup v2 `memory.max` value. `max` means unlimited.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_cgroup_limit(content: &str) -> Option<u64> {
    content.trim().parse::<u64>().ok().filter(|limit| *limit > 0)
}

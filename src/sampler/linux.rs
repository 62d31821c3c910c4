// Linux-specific helpers: /proc/meminfo.

/// Page cache size in bytes from the `Cached:` line of /proc/meminfo (Linux).
pub(super) fn read_cached_bytes_linux() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo_kb(&content, "Cached").map(|kb| kb * 1024)
    }
    #[cfg(not(target_os = "linux"))]
    None
}

/// Value of `key` in meminfo format (`Key:   1234 kB`), in kB.
pub(super) fn parse_meminfo_kb(content: &str, key: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if name.trim() != key {
            return None;
        }
        rest.split_whitespace().next()?.parse().ok()
    })
}

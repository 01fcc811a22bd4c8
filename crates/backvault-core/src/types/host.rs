//! Process and host identity written into lock and registry records.

/// Hostname of the current machine, or `"unknown"` if it cannot be read.
pub fn current_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Process id of the current process.
pub fn current_pid() -> u32 {
    std::process::id()
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

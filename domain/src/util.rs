//! Shared formatting helpers for progress reporting.

/// Scale a byte count to the largest binary unit below it.
///
/// Returns the value rounded to two decimals and the unit label
/// (`B`, `KiB`, `MiB` or `GiB`).
pub fn compress_bytes(bytes: f64) -> (f64, &'static str) {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let (value, unit) = if bytes < KIB {
        (bytes, "B")
    } else if bytes < MIB {
        (bytes / KIB, "KiB")
    } else if bytes < GIB {
        (bytes / MIB, "MiB")
    } else {
        (bytes / GIB, "GiB")
    };
    ((value * 100.0).round() / 100.0, unit)
}

/// Format a duration in seconds as `"Ns"` or `"Mmins, Ns"`.
pub fn format_minutes(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let minutes = total / 60;
    let secs = total % 60;
    if minutes == 0 {
        format!("{}s", secs)
    } else {
        format!("{}mins, {}s", minutes, secs)
    }
}

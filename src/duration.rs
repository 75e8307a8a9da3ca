//! Human-readable durations for the command line and logs.

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Suffix to seconds multiplier (longer suffixes first so "ms" wins over "s").
const UNITS: &[(&str, f64)] = &[
    ("ns", 1e-9),
    ("µs", 1e-6),
    ("us", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3600.0),
];

/// Parse interval strings like "500ms", "2s", "1.5m".
///
/// The result must be a positive, finite duration.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    for (suffix, seconds) in UNITS {
        if let Some(value) = s.strip_suffix(suffix) {
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid duration: {}", s))?;
            let total = value * seconds;
            if !(total > 0.0) {
                bail!("Duration must be positive: {}", s);
            }
            return Duration::try_from_secs_f64(total)
                .with_context(|| format!("Duration out of range: {}", s));
        }
    }

    bail!("Unknown duration format: {} (expected a unit such as ms, s or m)", s)
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}µs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else if d.as_secs() < 60 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{:.1}m", d.as_secs_f64() / 60.0)
    }
}

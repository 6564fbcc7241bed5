//! Small shared helpers.

use std::fmt::Write as _;
use std::time::Duration;

/// Render a duration as `1h 2m 3s 450ms`, omitting leading zero
/// components.
pub fn human_duration(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let milliseconds = total_ms % 1000;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h ");
    }
    if minutes > 0 {
        let _ = write!(out, "{minutes}m ");
    }
    if seconds > 0 {
        let _ = write!(out, "{seconds}s ");
    }
    if milliseconds > 0 || out.is_empty() {
        let _ = write!(out, "{milliseconds}ms");
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milliseconds_only() {
        assert_eq!(human_duration(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn zero_duration_still_prints() {
        assert_eq!(human_duration(Duration::ZERO), "0ms");
    }

    #[test]
    fn all_components() {
        let d = Duration::from_millis(3_600_000 + 2 * 60_000 + 3_000 + 450);
        assert_eq!(human_duration(d), "1h 2m 3s 450ms");
    }

    #[test]
    fn whole_seconds_omit_milliseconds() {
        assert_eq!(human_duration(Duration::from_secs(75)), "1m 15s");
    }
}

// crates/core/src/progress_line.rs
//! Percentage scraping from the fetch tool's human-readable output.

use std::sync::OnceLock;

use regex_lite::Regex;

fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+\.\d+)%").expect("valid percent regex"))
}

/// Parse the first `NN.N%` figure in a line of tool output.
///
/// Lines such as `[download]  42.3% of 10.00MiB at 1.00MiB/s ETA 00:05` yield
/// `Some(42.3)`. Lines without a decimal percentage yield `None`.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let caps = percent_regex().captures(line)?;
    caps.get(1)?.as_str().parse::<f64>().ok()
}

/// Clamp a reported percentage into `0..=100` and keep it from moving
/// backwards relative to `previous`.
pub fn monotonic_progress(previous: f64, reported: f64) -> f64 {
    let clamped = if reported.is_finite() {
        reported.clamp(0.0, 100.0)
    } else {
        previous
    };
    clamped.max(previous)
}

//! Progress bars and phase logging.
//!
//! Each pipeline phase gets a bar or spinner. In log-only mode the bars are
//! hidden and periodic `[PHASE] n/total` lines go to stderr instead, so a
//! background run can be followed with `tail -f`.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Progress bar over a known number of rows. Hidden in log-only mode.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb
}

/// Spinner for phases without a known length. Hidden in log-only mode.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_spinner()
            .template("{msg} {spinner} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Pipeline phase tag printed in front of log-only lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Read,
    Join,
    Agg,
    Write,
}

impl Phase {
    pub fn tag(self) -> &'static str {
        match self {
            Phase::Read => "READ",
            Phase::Join => "JOIN",
            Phase::Agg => "AGG",
            Phase::Write => "WRITE",
        }
    }
}

/// Log progress every `interval` rows (and at the end) in log-only mode.
pub fn log_progress(phase: Phase, current: u64, total: u64, interval: u64) {
    if let Some(line) = progress_line(phase, current, total, interval) {
        if is_log_only() {
            eprintln!("{}", line);
        }
    }
}

fn progress_line(phase: Phase, current: u64, total: u64, interval: u64) -> Option<String> {
    let due = (interval > 0 && current % interval == 0) || current == total;
    if !due || total == 0 {
        return None;
    }
    let pct = 100.0 * current as f64 / total as f64;
    Some(format!("[{}] {}/{} ({:.1}%)", phase.tag(), current, total, pct))
}

/// Log a finished phase in log-only mode (bars print their own message).
pub fn log_done(phase: Phase, msg: &str) {
    if is_log_only() {
        eprintln!("[{}] {}", phase.tag(), msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_progress_line_intervals() {
        assert_eq!(
            progress_line(Phase::Join, 500, 1000, 500).as_deref(),
            Some("[JOIN] 500/1000 (50.0%)")
        );
        assert!(progress_line(Phase::Join, 499, 1000, 500).is_none());
        assert!(progress_line(Phase::Join, 1000, 1000, 300).is_some());
        assert!(progress_line(Phase::Join, 0, 0, 10).is_none());
    }

    #[test]
    fn test_phase_tags() {
        let tags: Vec<_> = [Phase::Read, Phase::Join, Phase::Agg, Phase::Write]
            .into_iter()
            .map(Phase::tag)
            .collect();
        assert_eq!(tags, vec!["READ", "JOIN", "AGG", "WRITE"]);
        assert_eq!(
            progress_line(Phase::Write, 4, 4, 0).as_deref(),
            Some("[WRITE] 4/4 (100.0%)")
        );
    }
}

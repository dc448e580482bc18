//! Summary reporting for a finished batch.

use crate::batch::BatchResult;
use crate::errors::DiscoveryError;
use std::fmt::Write as _;
use std::time::Duration;

const RULE: &str = "══════════════════════════════════════════════════════════════";

/// One-line outcome, used for the spinner's final message.
pub fn summary_line(result: &BatchResult) -> String {
    let mut line = format!(
        "Converted {} of {} file(s)",
        result.succeeded, result.attempted
    );
    if result.failed > 0 {
        let _ = write!(line, "; {} failed", result.failed);
    }
    line
}

pub fn render_summary_report(
    result: &BatchResult,
    issues: &[DiscoveryError],
    duration: Duration,
    target_format: &str,
) -> String {
    let reduction = if result.input_bytes > 0 {
        (1.0 - result.output_bytes as f64 / result.input_bytes as f64) * 100.0
    } else {
        0.0
    };

    let mut out = String::new();
    let _ = writeln!(out, "╔{}╗", RULE);
    let _ = writeln!(out, "  VTTC Summary Report ({})", target_format.to_uppercase());
    let _ = writeln!(out, "╠{}╣", RULE);
    let _ = writeln!(out, "  Files Processed:  {:>12}", result.attempted);
    let _ = writeln!(out, "  Succeeded:        {:>12}", result.succeeded);
    let _ = writeln!(out, "  Failed:           {:>12}", result.failed);
    let _ = writeln!(out, "  Success Rate:     {:>11.1}%", result.success_rate());
    let _ = writeln!(out, "╠{}╣", RULE);
    let _ = writeln!(out, "  Input Size:       {:>12}", format_bytes(result.input_bytes));
    let _ = writeln!(out, "  Output Size:      {:>12}", format_bytes(result.output_bytes));
    let _ = writeln!(out, "  Size Reduction:   {:>11.1}%", reduction);
    let _ = writeln!(out, "╠{}╣", RULE);
    let _ = writeln!(out, "  Total Time:       {:>12}", format_duration(duration));
    if result.attempted > 0 {
        let avg = duration.as_secs_f64() / result.attempted as f64;
        let _ = writeln!(out, "  Avg Time/File:    {:>11.2}s", avg);
    }
    let _ = writeln!(out, "╚{}╝", RULE);

    if !result.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failed conversions:");
        for failure in &result.failures {
            let _ = writeln!(
                out,
                "   {} → {}",
                failure.input_path.display(),
                failure.detail
            );
        }
    }

    if !issues.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Skipped during discovery:");
        for issue in issues {
            let _ = writeln!(out, "   {}", issue);
        }
    }

    out
}

pub fn print_summary_report(
    result: &BatchResult,
    issues: &[DiscoveryError],
    duration: Duration,
    target_format: &str,
) {
    println!();
    print!(
        "{}",
        render_summary_report(result, issues, duration, target_format)
    );
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::WorkItem;
    use std::path::PathBuf;

    fn result_with_failure() -> BatchResult {
        let mut result = BatchResult::new();
        result.success(2048, 1024);
        result.fail(
            &WorkItem::new("/in/b.mov", "/in/output/b.mp3"),
            "Invalid data found when processing input".to_string(),
        );
        result
    }

    #[test]
    fn test_summary_line() {
        let mut result = BatchResult::new();
        result.success(1, 1);
        result.success(1, 1);
        assert_eq!(summary_line(&result), "Converted 2 of 2 file(s)");

        assert_eq!(
            summary_line(&result_with_failure()),
            "Converted 1 of 2 file(s); 1 failed"
        );
    }

    #[test]
    fn test_report_lists_failures_and_issues() {
        let issues = vec![DiscoveryError::UnreadableEntry {
            path: PathBuf::from("/in/locked"),
            message: "permission denied".to_string(),
        }];
        let report = render_summary_report(
            &result_with_failure(),
            &issues,
            Duration::from_secs(3),
            "mp3",
        );

        assert!(report.contains("VTTC Summary Report (MP3)"));
        assert!(report.contains("/in/b.mov → Invalid data found when processing input"));
        assert!(report.contains("/in/locked"));
        assert!(report.contains("50.0%"));
        assert!(report.contains("2.00 KB"));
    }

    #[test]
    fn test_report_empty_batch() {
        let report = render_summary_report(&BatchResult::new(), &[], Duration::ZERO, "webp");
        assert!(!report.contains("Failed conversions"));
        assert!(!report.contains("Avg Time/File"));
        print_summary_report(&BatchResult::new(), &[], Duration::ZERO, "webp");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}

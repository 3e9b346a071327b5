use crate::error::{Result, TapeError};
use crate::tape::{Position, StatusSnapshot};
use crate::traverse::{TraversalOutcome, TraversalReport};
use indicatif::{BinaryBytes, HumanDuration, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner counting bytes read
pub fn byte_spinner() -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {bytes} read ({bytes_per_sec}) {msg}")
        .map_err(|e| TapeError::Generic(e.into()))?;
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    Ok(bar)
}

/// Per-file table plus totals
pub fn print_report(report: &TraversalReport, elapsed: Duration) {
    println!("{:>6} {:>10} {:>14}  {}", "File", "Records", "Size", "Note");
    println!("{:-<44}", "");

    for file in &report.files {
        let note = match (file.records, file.complete) {
            (_, false) => "truncated by end of medium",
            (0, true) => "empty",
            _ => "",
        };
        println!(
            "{:>6} {:>10} {:>14}  {}",
            file.file_index,
            file.records,
            BinaryBytes(file.bytes).to_string(),
            note
        );
    }

    let outcome = match report.outcome {
        TraversalOutcome::EndOfMedium => "end of medium",
        TraversalOutcome::Stopped => "stopped by user",
        TraversalOutcome::FileLimit => "file limit reached",
    };

    println!();
    println!("  Files: {}", report.files.len());
    println!("  Records: {}", report.total_records());
    println!("  Bytes: {}", BinaryBytes(report.total_bytes()));
    println!("  Duration: {}", HumanDuration(elapsed));
    if let Some(speed) = average_speed(report.total_bytes(), elapsed) {
        println!("  Average Speed: {}", speed);
    }
    if report.read_retries > 0 {
        println!("  Read retries: {}", report.read_retries);
    }
    println!("  Finished: {} at {}", outcome, report.final_position);
}

/// Mean transfer rate, if anything was moved in measurable time
fn average_speed(bytes: u64, elapsed: Duration) -> Option<String> {
    let secs = elapsed.as_secs_f64();
    if bytes == 0 || secs <= 0.0 {
        return None;
    }
    Some(format!("{}/s", BinaryBytes((bytes as f64 / secs) as u64)))
}

fn optional(value: Option<u64>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

pub fn print_status(device: &str, status: &StatusSnapshot, tracked: &Position) {
    println!("Device: {}", device);
    println!("  File number: {}", optional(status.file_number));
    println!("  Block number: {}", optional(status.block_number));
    println!("  At file mark: {}", status.at_file_mark);
    println!("  End of medium: {}", status.end_of_medium);
    println!("  Device error: {}", status.device_error);
    println!("  Raw status: 0x{:08X}", status.raw_flags);
    println!("  Session position: {}", tracked);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_speed() {
        assert_eq!(
            average_speed(4 * 1024 * 1024, Duration::from_secs(2)).as_deref(),
            Some("2.00 MiB/s")
        );
        assert_eq!(average_speed(0, Duration::from_secs(2)), None);
        assert_eq!(average_speed(1024, Duration::ZERO), None);
    }

    #[test]
    fn test_optional_counter() {
        assert_eq!(optional(Some(7)), "7");
        assert_eq!(optional(None), "unknown");
    }
}

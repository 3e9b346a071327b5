//! Skip Command Handler
//!
//! Handles the `skip` subcommand: finish the current file, then space forward
//! over COUNT file marks.

use super::run_blocking;
use rust_tapewalk::config::AppConfig;
use rust_tapewalk::error::Result;
use rust_tapewalk::tape::{self, Position, RecordEvent, SkipOutcome, TapeIo, TapeSession};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipReport {
    /// Records read to reach the file mark
    pub records_passed: u64,
    /// None when end of medium came before the file mark
    pub outcome: Option<SkipOutcome>,
    pub position: Position,
}

pub async fn execute(config: AppConfig, device: String, count: u32) -> Result<()> {
    info!("Skipping {} file mark(s) on {}", count, device);

    let report = run_blocking(move || {
        let mut session = tape::open_session(&device, &config.mtio)?;
        let report = skip_session(&mut session, &config, count);
        session.close();
        report
    })
    .await?;

    match report.outcome {
        Some(SkipOutcome::InFile) => println!(
            "Skipped {} file mark(s) after {} record(s).",
            count, report.records_passed
        ),
        Some(SkipOutcome::EndOfMedium) => {
            println!("End of medium reached while spacing over file marks.")
        }
        None => println!("End of medium reached before a file mark."),
    }
    println!("Position: {}", report.position);
    Ok(())
}

pub fn skip_session<D: TapeIo>(
    session: &mut TapeSession<D>,
    config: &AppConfig,
    count: u32,
) -> Result<SkipReport> {
    let mut buf = vec![0u8; config.block_size];
    let mut records_passed = 0;

    loop {
        match session.read_record(&mut buf)? {
            RecordEvent::Data(_) => records_passed += 1,
            RecordEvent::FileMark => break,
            RecordEvent::EndOfMedium => {
                return Ok(SkipReport {
                    records_passed,
                    outcome: None,
                    position: session.position(),
                })
            }
        }
    }

    let outcome = session.skip_files(count)?;
    Ok(SkipReport {
        records_passed,
        outcome: Some(outcome),
        position: session.position(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_tapewalk::tape::{Boundary, ScriptedTape};

    #[test]
    fn test_skip_reads_to_mark_then_spaces() {
        let mut session = TapeSession::with_device(ScriptedTape::with_record_counts(&[3, 1, 2], 8));
        let report = skip_session(&mut session, &AppConfig::default(), 2).unwrap();

        assert_eq!(report.records_passed, 3);
        assert_eq!(report.outcome, Some(SkipOutcome::InFile));
        assert_eq!(report.position.file_index, 2);
        assert_eq!(report.position.boundary, Boundary::InFile);
    }

    #[test]
    fn test_skip_past_last_file() {
        let mut session = TapeSession::with_device(ScriptedTape::with_record_counts(&[1], 8));
        let report = skip_session(&mut session, &AppConfig::default(), 1).unwrap();

        assert_eq!(report.outcome, Some(SkipOutcome::EndOfMedium));
        assert!(report.position.is_terminal());
    }
}

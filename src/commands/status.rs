//! Status Command Handler
//!
//! Handles the `status` subcommand: query the drive through a fresh session.

use super::run_blocking;
use rust_tapewalk::config::AppConfig;
use rust_tapewalk::display;
use rust_tapewalk::error::{Result, TapeError};
use rust_tapewalk::tape::{self, Position, StatusSnapshot, TapeIo, TapeSession};
use tracing::{info, warn};

/// Status query result; `desync` is set when the drive is not where a fresh
/// session assumes it to be (file 0)
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: StatusSnapshot,
    pub position: Position,
    pub desync: bool,
}

pub async fn execute(config: AppConfig, device: String, json: bool) -> Result<()> {
    info!("Checking device status: {}", device);

    let device_name = device.clone();
    let report = run_blocking(move || {
        let mut session = tape::open_session(&device, &config.mtio)?;
        let report = status_session(&mut session);
        session.close();
        report
    })
    .await?;

    if json {
        let text = serde_json::to_string_pretty(&report.status)
            .map_err(|e| TapeError::Generic(e.into()))?;
        println!("{}", text);
    } else {
        display::print_status(&device_name, &report.status, &report.position);
        if report.desync {
            println!("Note: tape is not at the first file; file indices count from the open position");
        }
    }
    Ok(())
}

pub fn status_session<D: TapeIo>(session: &mut TapeSession<D>) -> Result<StatusReport> {
    match session.current_status() {
        Ok(status) => Ok(StatusReport {
            status,
            position: session.position(),
            desync: false,
        }),
        Err(TapeError::PositionDesync { position, snapshot, .. }) => {
            warn!("Drive position differs from a freshly opened session");
            Ok(StatusReport {
                status: snapshot,
                position,
                desync: true,
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_tapewalk::tape::ScriptedTape;

    #[test]
    fn test_status_at_start() {
        let mut session = TapeSession::with_device(ScriptedTape::with_record_counts(&[1], 8));
        let report = status_session(&mut session).unwrap();
        assert!(!report.desync);
        assert_eq!(report.status.file_number, Some(0));
    }

    #[test]
    fn test_status_reports_desync_without_failing() {
        let mut tape = ScriptedTape::with_record_counts(&[1], 8);
        tape.report_file_number(Some(4));
        let mut session = TapeSession::with_device(tape);

        let report = status_session(&mut session).unwrap();
        assert!(report.desync);
        assert_eq!(report.status.file_number, Some(4));
        assert_eq!(report.position.file_index, 0);
    }
}

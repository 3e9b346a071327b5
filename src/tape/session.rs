//! Tape Session
//!
//! Turns raw block reads plus out-of-band spacing commands into a sequence of
//! records and files. The session's [`Position`] is maintained incrementally
//! and is authoritative; device status is only ever compared against it.
//!
//! | State         | Data    | zero-length read | skip ok          | skip → EOM      |
//! |---------------|---------|------------------|------------------|-----------------|
//! | InFile        | stay    | → AtFileMark     | invalid          | invalid         |
//! | AtFileMark    | invalid | invalid          | → InFile, +count | → AtEndOfMedium |
//! | AtEndOfMedium | invalid | invalid          | invalid          | invalid         |
//!
//! Faults leave the position untouched in every state.

use super::device::{PrimitiveError, TapeIo};
use super::types::{Boundary, Position, RecordEvent, SkipOutcome, StatusSnapshot};
use crate::error::{ControlOp, Result, TapeError};
use tracing::{debug, info, warn};

pub struct TapeSession<D: TapeIo> {
    device: D,
    position: Position,
}

impl<D: TapeIo> TapeSession<D> {
    /// Bind a session to an already opened device
    pub fn with_device(device: D) -> Self {
        Self {
            device,
            position: Position::start(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the backend, e.g. to inject faults in a scripted tape
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn invalid(&self, operation: &'static str) -> TapeError {
        debug!("Rejecting {} at {}", operation, self.position);
        TapeError::InvalidState {
            operation,
            position: self.position,
        }
    }

    /// Read one record into `buf`.
    ///
    /// Only valid while inside a file. A zero-length read moves the session
    /// to `AtFileMark` without advancing the file index.
    pub fn read_record(&mut self, buf: &mut [u8]) -> Result<RecordEvent> {
        if self.position.boundary != Boundary::InFile {
            return Err(self.invalid("read_record"));
        }

        match self.device.read_block(buf) {
            Ok(0) => {
                info!(
                    "File mark detected after {} record(s) of file {}",
                    self.position.record_index, self.position.file_index
                );
                self.position.boundary = Boundary::AtFileMark;
                Ok(RecordEvent::FileMark)
            }
            Ok(n) => {
                debug!("Read {} bytes at {}", n, self.position);
                self.position.record_index += 1;
                Ok(RecordEvent::Data(n))
            }
            Err(PrimitiveError::EndOfMedium) => {
                info!("End of medium reached while reading file {}", self.position.file_index);
                self.position.boundary = Boundary::AtEndOfMedium;
                Ok(RecordEvent::EndOfMedium)
            }
            Err(PrimitiveError::Io(source)) => {
                warn!("Read fault at {}: {}", self.position, source);
                Err(TapeError::ReadFault {
                    position: self.position,
                    source,
                })
            }
        }
    }

    /// Advance past `count` file marks, starting from the mark already reached.
    pub fn skip_files(&mut self, count: u32) -> Result<SkipOutcome> {
        if self.position.boundary != Boundary::AtFileMark || count == 0 {
            return Err(self.invalid("skip_files"));
        }

        let status = self.device.space_file_marks(count).map_err(|source| {
            warn!("Spacing {} file mark(s) failed at {}: {}", count, self.position, source);
            TapeError::ControlFault {
                operation: ControlOp::SpaceFileMarks,
                position: self.position,
                reason: source.to_string(),
                source: Some(source),
            }
        })?;

        match (status.at_file_mark, status.end_of_medium) {
            (true, false) => {
                self.position.file_index += u64::from(count);
                self.position.record_index = 0;
                self.position.boundary = Boundary::InFile;
                info!(
                    "Skipped {} file mark(s), now at file {}",
                    count, self.position.file_index
                );
                Ok(SkipOutcome::InFile)
            }
            (false, true) => {
                self.position.boundary = Boundary::AtEndOfMedium;
                info!("End of medium reached after file {}", self.position.file_index);
                Ok(SkipOutcome::EndOfMedium)
            }
            (at_file_mark, end_of_medium) => {
                warn!(
                    "Ambiguous spacing report: file mark={}, end of medium={}, raw=0x{:08X}",
                    at_file_mark, end_of_medium, status.raw_flags
                );
                Err(TapeError::ControlFault {
                    operation: ControlOp::SpaceFileMarks,
                    position: self.position,
                    reason: format!(
                        "status sets {} of file-mark/end-of-medium flags",
                        if at_file_mark { "both" } else { "neither" }
                    ),
                    source: None,
                })
            }
        }
    }

    /// Query the device and check it against the tracked position.
    ///
    /// A reported file number that disagrees with the tracked file index is a
    /// `PositionDesync`; the tracked position is never overwritten.
    pub fn current_status(&mut self) -> Result<StatusSnapshot> {
        if self.position.is_terminal() {
            return Err(self.invalid("current_status"));
        }

        let snapshot = self.device.query_status().map_err(|source| TapeError::ControlFault {
            operation: ControlOp::QueryStatus,
            position: self.position,
            reason: source.to_string(),
            source: Some(source),
        })?;

        if let Some(reported_file) = snapshot.file_number {
            if reported_file != self.position.file_index {
                warn!(
                    "Device reports file {} but session tracks {}",
                    reported_file, self.position
                );
                return Err(TapeError::PositionDesync {
                    position: self.position,
                    reported_file,
                    snapshot,
                });
            }
        }

        debug!("Status corroborates {}", self.position);
        Ok(snapshot)
    }

    /// Release the device. Valid in every state, including end of medium.
    pub fn close(self) {
        debug!("Closing tape session at {}", self.position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tape::scripted::ScriptedTape;

    fn session(counts: &[usize]) -> TapeSession<ScriptedTape> {
        TapeSession::with_device(ScriptedTape::with_record_counts(counts, 16))
    }

    #[test]
    fn test_data_keeps_in_file_until_zero_read() {
        let mut s = session(&[5]);
        let mut buf = [0u8; 64];

        for i in 1..=5 {
            assert_eq!(s.read_record(&mut buf).unwrap(), RecordEvent::Data(16));
            assert_eq!(s.position().boundary, Boundary::InFile);
            assert_eq!(s.position().record_index, i);
        }

        assert_eq!(s.read_record(&mut buf).unwrap(), RecordEvent::FileMark);
        assert_eq!(s.position().boundary, Boundary::AtFileMark);
        assert_eq!(s.position().file_index, 0);
    }

    #[test]
    fn test_read_at_file_mark_is_invalid() {
        let mut s = session(&[0, 1]);
        let mut buf = [0u8; 64];

        assert_eq!(s.read_record(&mut buf).unwrap(), RecordEvent::FileMark);
        let reads = s.device().calls().reads;

        let err = s.read_record(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(s.device().calls().reads, reads);
        assert_eq!(s.position().boundary, Boundary::AtFileMark);
    }

    #[test]
    fn test_skip_in_file_is_invalid_and_silent() {
        let mut s = session(&[3, 1]);
        let mut buf = [0u8; 64];
        s.read_record(&mut buf).unwrap();
        let before = s.position();

        let err = s.skip_files(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.position(), Some(before));
        assert_eq!(s.position(), before);
        assert_eq!(s.device().calls().spaces, 0);
    }

    #[test]
    fn test_skip_zero_is_invalid() {
        let mut s = session(&[0, 0]);
        let mut buf = [0u8; 64];
        s.read_record(&mut buf).unwrap();

        assert_eq!(s.skip_files(0).unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(s.device().calls().spaces, 0);
    }

    #[test]
    fn test_skip_advances_file_index_by_count() {
        let mut s = session(&[1, 1, 1, 2]);
        let mut buf = [0u8; 64];
        s.read_record(&mut buf).unwrap();
        s.read_record(&mut buf).unwrap();

        assert_eq!(s.skip_files(3).unwrap(), SkipOutcome::InFile);
        assert_eq!(s.position(), Position { file_index: 3, record_index: 0, boundary: Boundary::InFile });
        assert_eq!(s.read_record(&mut buf).unwrap(), RecordEvent::Data(16));
    }

    #[test]
    fn test_skip_into_end_of_medium_keeps_file_index() {
        let mut s = session(&[1]);
        let mut buf = [0u8; 64];
        s.read_record(&mut buf).unwrap();
        s.read_record(&mut buf).unwrap();

        assert_eq!(s.skip_files(1).unwrap(), SkipOutcome::EndOfMedium);
        assert_eq!(s.position().boundary, Boundary::AtEndOfMedium);
        assert_eq!(s.position().file_index, 0);
    }

    #[test]
    fn test_skip_failure_leaves_position() {
        let mut s = session(&[0, 1]);
        let mut buf = [0u8; 64];
        s.read_record(&mut buf).unwrap();
        s.device_mut().fail_next_space();
        let before = s.position();

        let err = s.skip_files(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ControlFault);
        assert_eq!(s.position(), before);

        // Retrying is up to the caller and works once the device recovers
        assert_eq!(s.skip_files(1).unwrap(), SkipOutcome::InFile);
        assert_eq!(s.position().file_index, 1);
    }

    #[test]
    fn test_ambiguous_skip_report_is_control_fault() {
        for flags in [(true, true), (false, false)] {
            let mut s = session(&[0, 1]);
            let mut buf = [0u8; 64];
            s.read_record(&mut buf).unwrap();
            s.device_mut().override_space_flags(Some(flags));
            let before = s.position();

            let err = s.skip_files(1).unwrap_err();
            assert!(matches!(
                err,
                TapeError::ControlFault { operation: ControlOp::SpaceFileMarks, source: None, .. }
            ));
            assert_eq!(s.position(), before);
        }
    }

    #[test]
    fn test_read_fault_leaves_position_and_desync_detected() {
        let mut s = TapeSession::with_device(ScriptedTape::with_record_counts(&[4], 8).fail_read(3));
        let mut buf = [0u8; 8];
        s.read_record(&mut buf).unwrap();
        s.read_record(&mut buf).unwrap();
        let before = s.position();

        let err = s.read_record(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadFault);
        assert_eq!(err.position(), Some(before));
        assert_eq!(s.position(), before);

        // Status agrees: no desync
        assert!(s.current_status().is_ok());

        s.device_mut().report_file_number(Some(7));
        match s.current_status().unwrap_err() {
            TapeError::PositionDesync { position, reported_file, snapshot } => {
                assert_eq!(position, before);
                assert_eq!(reported_file, 7);
                assert_eq!(snapshot.file_number, Some(7));
            }
            other => panic!("expected desync, got {other:?}"),
        }
        assert_eq!(s.position(), before);
    }

    #[test]
    fn test_status_without_file_number_is_not_checked() {
        let mut s = session(&[1]);
        s.device_mut().report_file_number(None);
        let status = s.current_status().unwrap();
        assert_eq!(status.file_number, None);
        assert_eq!(status.block_number, Some(0));
    }

    #[test]
    fn test_terminal_state_rejects_everything_without_device_calls() {
        let mut s = session(&[]);
        let mut buf = [0u8; 64];

        assert_eq!(s.read_record(&mut buf).unwrap(), RecordEvent::EndOfMedium);
        assert!(s.position().is_terminal());
        let calls = s.device().calls();

        for _ in 0..3 {
            assert_eq!(s.read_record(&mut buf).unwrap_err().kind(), ErrorKind::InvalidState);
            assert_eq!(s.skip_files(1).unwrap_err().kind(), ErrorKind::InvalidState);
            assert_eq!(s.current_status().unwrap_err().kind(), ErrorKind::InvalidState);
        }

        assert_eq!(s.device().calls(), calls);
        s.close();
    }
}

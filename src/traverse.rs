//! Whole-Tape Traversal
//!
//! Reads records until a file mark, spaces over it, and repeats until end of
//! medium or an unrecovered fault. Retrying is decided here, by the caller of
//! the session, never by the session itself.

use crate::error::{ErrorKind, Result};
use crate::tape::{Position, RecordEvent, SkipOutcome, TapeIo, TapeSession};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Caller-side policy for a traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalPolicy {
    /// Retries of a faulted read before giving up (0 = fail on first fault)
    pub max_read_retries: u32,
    /// Stop after this many files have been read to their file mark
    pub max_files: Option<u64>,
}

impl Default for TraversalPolicy {
    fn default() -> Self {
        Self {
            max_read_retries: 0,
            max_files: None,
        }
    }
}

/// Records and bytes of one tape file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub file_index: u64,
    pub records: u64,
    pub bytes: u64,
    /// False when end of medium was hit before the file mark
    pub complete: bool,
}

#[derive(Debug)]
pub enum TraversalEvent<'a> {
    Record {
        file_index: u64,
        record_index: u64,
        data: &'a [u8],
    },
    FileMark(&'a FileSummary),
    EndOfMedium(Position),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOutcome {
    EndOfMedium,
    /// The stop flag was raised between records
    Stopped,
    /// `max_files` was reached
    FileLimit,
}

#[derive(Debug, Clone)]
pub struct TraversalReport {
    pub files: Vec<FileSummary>,
    pub outcome: TraversalOutcome,
    pub final_position: Position,
    pub read_retries: u64,
}

impl TraversalReport {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    pub fn total_records(&self) -> u64 {
        self.files.iter().map(|f| f.records).sum()
    }
}

/// Traverse the tape from the session's current position.
///
/// `on_event` sees every record, file mark and the final end of medium; an
/// error from it aborts the traversal.
pub fn traverse<D, F>(
    session: &mut TapeSession<D>,
    buf: &mut [u8],
    policy: &TraversalPolicy,
    stop: &AtomicBool,
    mut on_event: F,
) -> Result<TraversalReport>
where
    D: TapeIo,
    F: FnMut(TraversalEvent<'_>) -> Result<()>,
{
    let mut files = Vec::new();
    let mut records = 0u64;
    let mut bytes = 0u64;
    let mut attempts = 0u32;
    let mut read_retries = 0u64;

    let outcome = loop {
        if stop.load(Ordering::Relaxed) {
            info!("Traversal stopped at {}", session.position());
            break TraversalOutcome::Stopped;
        }

        match session.read_record(buf) {
            Ok(RecordEvent::Data(n)) => {
                attempts = 0;
                records += 1;
                bytes += n as u64;
                let position = session.position();
                on_event(TraversalEvent::Record {
                    file_index: position.file_index,
                    record_index: position.record_index - 1,
                    data: &buf[..n],
                })?;
            }
            Ok(RecordEvent::FileMark) => {
                attempts = 0;
                let summary = FileSummary {
                    file_index: session.position().file_index,
                    records,
                    bytes,
                    complete: true,
                };
                on_event(TraversalEvent::FileMark(&summary))?;
                files.push(summary);
                records = 0;
                bytes = 0;

                if let Some(max_files) = policy.max_files {
                    if files.len() as u64 >= max_files {
                        info!("File limit {} reached", max_files);
                        break TraversalOutcome::FileLimit;
                    }
                }

                if session.skip_files(1)? == SkipOutcome::EndOfMedium {
                    on_event(TraversalEvent::EndOfMedium(session.position()))?;
                    break TraversalOutcome::EndOfMedium;
                }
            }
            Ok(RecordEvent::EndOfMedium) => {
                if records > 0 {
                    warn!(
                        "End of medium inside file {} after {} record(s)",
                        session.position().file_index,
                        records
                    );
                    files.push(FileSummary {
                        file_index: session.position().file_index,
                        records,
                        bytes,
                        complete: false,
                    });
                }
                on_event(TraversalEvent::EndOfMedium(session.position()))?;
                break TraversalOutcome::EndOfMedium;
            }
            Err(err) if err.kind() == ErrorKind::ReadFault && attempts < policy.max_read_retries => {
                attempts += 1;
                read_retries += 1;
                warn!(
                    "Retrying read ({}/{}): {}",
                    attempts, policy.max_read_retries, err
                );

                // Reconcile before retrying; a desync is not recoverable here
                match session.current_status() {
                    Ok(status) => debug!("Status before retry: {:?}", status),
                    Err(e) if e.kind() == ErrorKind::PositionDesync => return Err(e),
                    Err(e) => warn!("Status unavailable before retry: {}", e),
                }
            }
            Err(err) => return Err(err),
        }
    };

    Ok(TraversalReport {
        files,
        outcome,
        final_position: session.position(),
        read_retries,
    })
}

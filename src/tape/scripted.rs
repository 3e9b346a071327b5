//! Scripted Tape
//!
//! An in-memory tape with fixed records and file marks, followed by end of
//! medium. It behaves like a tape driver that stops *at* a file mark after a
//! zero-length read, and it counts every primitive call so callers can check
//! which operations reached the device.

use super::device::{PrimitiveError, TapeIo};
use super::types::StatusSnapshot;
use std::collections::BTreeSet;
use std::io;
use tracing::debug;

/// Primitive calls issued against a [`ScriptedTape`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub reads: usize,
    pub spaces: usize,
    pub status_queries: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.reads + self.spaces + self.status_queries
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedTape {
    files: Vec<Vec<Vec<u8>>>,
    file: usize,
    record: usize,
    at_mark: bool,
    end_of_medium: bool,
    calls: CallCounts,
    failing_reads: BTreeSet<usize>,
    fail_next_space: bool,
    reported_file: Option<Option<u64>>,
    space_flags: Option<(bool, bool)>,
}

impl ScriptedTape {
    /// Build a tape from files of records. Empty records are dropped since a
    /// zero-length block cannot be told apart from a file mark.
    pub fn new(files: Vec<Vec<Vec<u8>>>) -> Self {
        let files = files
            .into_iter()
            .map(|records| records.into_iter().filter(|r| !r.is_empty()).collect())
            .collect();

        Self {
            files,
            file: 0,
            record: 0,
            at_mark: false,
            end_of_medium: false,
            calls: CallCounts::default(),
            failing_reads: BTreeSet::new(),
            fail_next_space: false,
            reported_file: None,
            space_flags: None,
        }
    }

    /// Tape whose files hold `counts[i]` records of `record_len` bytes each.
    /// Record bytes encode their file and record number.
    pub fn with_record_counts(counts: &[usize], record_len: usize) -> Self {
        let files = counts
            .iter()
            .enumerate()
            .map(|(file, &records)| {
                (0..records)
                    .map(|record| {
                        (0..record_len.max(1))
                            .map(|i| (file * 31 + record * 7 + i) as u8)
                            .collect()
                    })
                    .collect()
            })
            .collect();
        Self::new(files)
    }

    pub fn calls(&self) -> CallCounts {
        self.calls
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Make the `nth` read call (1-based, counting all reads) fail with EIO
    pub fn fail_read(mut self, nth: usize) -> Self {
        self.failing_reads.insert(nth);
        self
    }

    /// Make the next spacing command fail
    pub fn fail_next_space(&mut self) {
        self.fail_next_space = true;
    }

    /// Report this file number (or none at all) in every status instead of
    /// the real one
    pub fn report_file_number(&mut self, file: Option<u64>) {
        self.reported_file = Some(file);
    }

    /// Force the (at_file_mark, end_of_medium) flags of spacing reports
    pub fn override_space_flags(&mut self, flags: Option<(bool, bool)>) {
        self.space_flags = flags;
    }

    fn snapshot(&self) -> StatusSnapshot {
        let file_number = self.reported_file.unwrap_or(Some(self.file as u64));
        let mut raw_flags = 0;
        if self.at_mark {
            raw_flags |= 0x1;
        }
        if self.end_of_medium {
            raw_flags |= 0x2;
        }

        StatusSnapshot {
            file_number,
            block_number: Some(self.record as u64),
            at_file_mark: self.at_mark,
            end_of_medium: self.end_of_medium,
            device_error: false,
            raw_flags,
        }
    }
}

impl TapeIo for ScriptedTape {
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, PrimitiveError> {
        self.calls.reads += 1;

        if self.failing_reads.remove(&self.calls.reads) {
            debug!("Scripted read {} fails", self.calls.reads);
            return Err(PrimitiveError::Io(io::Error::from_raw_os_error(5)));
        }

        if self.end_of_medium || self.file >= self.files.len() {
            self.end_of_medium = true;
            return Err(PrimitiveError::EndOfMedium);
        }

        if self.at_mark {
            return Ok(0);
        }

        match self.files[self.file].get(self.record) {
            Some(record) => {
                let n = record.len().min(buf.len());
                buf[..n].copy_from_slice(&record[..n]);
                self.record += 1;
                Ok(n)
            }
            None => {
                self.at_mark = true;
                Ok(0)
            }
        }
    }

    fn space_file_marks(&mut self, count: u32) -> io::Result<StatusSnapshot> {
        self.calls.spaces += 1;

        if std::mem::take(&mut self.fail_next_space) {
            return Err(io::Error::new(io::ErrorKind::Other, "scripted spacing failure"));
        }

        let target = self.file + count as usize;
        if target >= self.files.len() {
            self.end_of_medium = true;
            self.at_mark = false;
        } else {
            self.file = target;
            self.record = 0;
            // Just passed a mark
            self.at_mark = true;
        }

        let mut status = self.snapshot();
        if !self.end_of_medium {
            self.at_mark = false;
        }
        if let Some((at_file_mark, end_of_medium)) = self.space_flags {
            status.at_file_mark = at_file_mark;
            status.end_of_medium = end_of_medium;
        }
        Ok(status)
    }

    fn query_status(&mut self) -> io::Result<StatusSnapshot> {
        self.calls.status_queries += 1;
        Ok(self.snapshot())
    }
}

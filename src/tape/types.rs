use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the session believes the tape head is relative to file boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    /// Inside a file, more records may follow
    InFile,
    /// A zero-length read reported the end of the current file
    AtFileMark,
    /// End of medium reached; only close is valid
    AtEndOfMedium,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::InFile => write!(f, "in file"),
            Boundary::AtFileMark => write!(f, "at file mark"),
            Boundary::AtEndOfMedium => write!(f, "at end of medium"),
        }
    }
}

/// Tracked logical position of a tape session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub file_index: u64,
    /// Data records read in the current file
    pub record_index: u64,
    pub boundary: Boundary,
}

impl Position {
    pub fn start() -> Self {
        Self {
            file_index: 0,
            record_index: 0,
            boundary: Boundary::InFile,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.boundary == Boundary::AtEndOfMedium
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file {} record {} ({})",
            self.file_index, self.record_index, self.boundary
        )
    }
}

/// Point-in-time device status, as returned by the control channel.
///
/// This is a query result. The session's own [`Position`] stays authoritative;
/// snapshots are only compared against it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Current file number, if the driver tracks it
    pub file_number: Option<u64>,
    /// Block number within the current file, if the driver tracks it
    pub block_number: Option<u64>,
    pub at_file_mark: bool,
    pub end_of_medium: bool,
    pub device_error: bool,
    /// Driver-specific status word the flags were decoded from
    pub raw_flags: u64,
}

/// Outcome of a successful `read_record`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEvent {
    /// `n > 0` bytes were placed in the caller buffer
    Data(usize),
    /// The read returned zero bytes: end of the current file
    FileMark,
    /// The read primitive reported end of medium
    EndOfMedium,
}

/// Outcome of a successful `skip_files`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    /// Positioned at the start of the next file
    InFile,
    /// Spacing ran into end of medium
    EndOfMedium,
}

//! Tape Device Primitives
//!
//! The two collaborator channels a session drives: byte reads and device
//! control (spacing and status). Backends implement [`TapeIo`].

use super::types::StatusSnapshot;
use std::io;
use thiserror::Error;

/// Failure of the byte-read primitive
#[derive(Error, Debug)]
pub enum PrimitiveError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("end of medium")]
    EndOfMedium,
}

pub trait TapeIo {
    /// Read the next tape block into `buf`.
    ///
    /// `Ok(0)` means a file mark was reached. Any hardware or medium fault is
    /// an error, never a zero-length read.
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, PrimitiveError>;

    /// Space forward over `count` file marks and report the resulting status.
    ///
    /// Running into end of medium is reported through the returned status,
    /// not as an error.
    fn space_file_marks(&mut self, count: u32) -> io::Result<StatusSnapshot>;

    /// Query the current device status
    fn query_status(&mut self) -> io::Result<StatusSnapshot>;
}

impl<T: TapeIo + ?Sized> TapeIo for Box<T> {
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, PrimitiveError> {
        (**self).read_block(buf)
    }

    fn space_file_marks(&mut self, count: u32) -> io::Result<StatusSnapshot> {
        (**self).space_file_marks(count)
    }

    fn query_status(&mut self) -> io::Result<StatusSnapshot> {
        (**self).query_status()
    }
}

//! Linux SCSI Tape (st) Backend
//!
//! Reads go through the character special file; spacing and status go through
//! the `MTIOCTOP` / `MTIOCGET` ioctls. Request numbers, operation codes and
//! status flag masks are taken from [`MtioConfig`] so other driver ABIs can be
//! described without touching the session state machine.
//!
//! See also: man 4 st, /usr/include/x86_64-linux-gnu/sys/mtio.h

use serde::{Deserialize, Serialize};

/// mt_op: forward space over file mark, position at first record of next file
pub const MTFSF: i16 = 1;

// Generic (device independent) status bits of mt_gstat
pub const GMT_EOF: u64 = 0x8000_0000;
pub const GMT_BOT: u64 = 0x4000_0000;
pub const GMT_EOT: u64 = 0x2000_0000;
pub const GMT_EOD: u64 = 0x0800_0000;
pub const GMT_DR_OPEN: u64 = 0x0004_0000;

/// _IOW('m', 1, struct mtop)
pub const MTIOCTOP: u64 = 0x4008_6d01;

/// _IOR('m', 2, struct mtget)
#[cfg(target_pointer_width = "64")]
pub const MTIOCGET: u64 = 0x8030_6d02;
#[cfg(not(target_pointer_width = "64"))]
pub const MTIOCGET: u64 = 0x801c_6d02;

/// Driver ABI description for the mtio backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MtioConfig {
    /// ioctl request number for tape operations (MTIOCTOP)
    pub op_request: u64,
    /// ioctl request number for status (MTIOCGET)
    pub status_request: u64,
    /// mt_op code for "space forward N file marks"
    pub space_forward_file_op: i16,
    /// mt_gstat bits meaning "positioned at/after a file mark"
    pub file_mark_mask: u64,
    /// mt_gstat bits meaning end of medium (end of data or end of tape)
    pub end_of_medium_mask: u64,
    /// mt_gstat bits reported as a device error
    pub device_error_mask: u64,
    /// The driver leaves the head after the mark when a read returns 0
    pub read_passes_file_mark: bool,
    /// Clear the file-mark flag whenever an end-of-medium bit is set
    pub end_of_medium_masks_file_mark: bool,
}

impl Default for MtioConfig {
    fn default() -> Self {
        Self {
            op_request: MTIOCTOP,
            status_request: MTIOCGET,
            space_forward_file_op: MTFSF,
            file_mark_mask: GMT_EOF,
            end_of_medium_mask: GMT_EOD | GMT_EOT,
            device_error_mask: GMT_DR_OPEN,
            read_passes_file_mark: true,
            end_of_medium_masks_file_mark: true,
        }
    }
}

#[cfg(unix)]
pub use self::unix::MtioTape;

#[cfg(unix)]
mod unix {
    use super::MtioConfig;
    use crate::error::{Result, TapeError};
    use crate::tape::device::{PrimitiveError, TapeIo};
    use crate::tape::types::StatusSnapshot;
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read};
    use std::os::unix::fs::FileTypeExt;
    use tracing::{debug, warn};

    #[repr(C)]
    pub(super) struct MtOp {
        pub mt_op: libc::c_short,
        pub mt_count: libc::c_int,
    }

    #[repr(C)]
    #[derive(Default, Debug, Clone, Copy)]
    pub(super) struct MtGet {
        pub mt_type: libc::c_long,
        pub mt_resid: libc::c_long,
        pub mt_dsreg: libc::c_long,
        pub mt_gstat: libc::c_long,
        pub mt_erreg: libc::c_long,
        pub mt_fileno: i32,
        pub mt_blkno: i32,
    }

    /// Turn an MTIOCGET result into a snapshot in the session's terms.
    ///
    /// With `mark_consumed`, the driver has already moved past the mark the
    /// session considers itself positioned at, so the file number is reported
    /// one lower and the block number is unknown.
    pub(super) fn decode_status(
        raw: &MtGet,
        config: &MtioConfig,
        mark_consumed: bool,
    ) -> StatusSnapshot {
        let gstat = (raw.mt_gstat as u64) & 0xFFFF_FFFF;
        let end_of_medium = gstat & config.end_of_medium_mask != 0;
        let mut at_file_mark = gstat & config.file_mark_mask != 0;
        if end_of_medium && config.end_of_medium_masks_file_mark {
            at_file_mark = false;
        }

        let mut file_number = u64::try_from(raw.mt_fileno).ok();
        let mut block_number = u64::try_from(raw.mt_blkno).ok();
        if mark_consumed {
            file_number = file_number.map(|n| n.saturating_sub(1));
            block_number = None;
        }

        StatusSnapshot {
            file_number,
            block_number,
            at_file_mark,
            end_of_medium,
            device_error: gstat & config.device_error_mask != 0,
            raw_flags: gstat,
        }
    }

    /// Tape device opened through the Linux st driver
    pub struct MtioTape {
        file: File,
        device_path: String,
        config: MtioConfig,
        mark_consumed: bool,
    }

    impl MtioTape {
        /// Open a tape special file read-only
        pub fn open(device_path: &str, config: MtioConfig) -> Result<Self> {
            debug!("Opening tape device: {}", device_path);

            let file = OpenOptions::new()
                .read(true)
                .open(device_path)
                .map_err(|e| TapeError::from_open_error(device_path, e))?;

            match file.metadata() {
                Ok(meta) if !meta.file_type().is_char_device() => {
                    warn!(
                        "{} is not a character device, control commands will likely fail",
                        device_path
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("Cannot stat {}: {}", device_path, e),
            }

            debug!("Device opened successfully: {}", device_path);
            Ok(Self {
                file,
                device_path: device_path.to_string(),
                config,
                mark_consumed: false,
            })
        }

        pub fn device_path(&self) -> &str {
            &self.device_path
        }

        /// The last zero-length read left the driver past the file mark
        pub fn passed_file_mark(&self) -> bool {
            self.mark_consumed
        }

        #[cfg(target_os = "linux")]
        fn mt_op(&self, op: i16, count: i32) -> io::Result<()> {
            use nix::errno::Errno;
            use nix::sys::ioctl::ioctl_num_type;
            use std::os::unix::io::AsRawFd;

            let cmd = MtOp {
                mt_op: op,
                mt_count: count,
            };
            debug!("MTIOCTOP: op={}, count={}", op, count);

            let ret = unsafe {
                libc::ioctl(
                    self.file.as_raw_fd(),
                    self.config.op_request as ioctl_num_type,
                    &cmd as *const MtOp,
                )
            };
            Errno::result(ret).map(drop).map_err(io::Error::from)
        }

        #[cfg(target_os = "linux")]
        fn mt_get(&self) -> io::Result<MtGet> {
            use nix::errno::Errno;
            use nix::sys::ioctl::ioctl_num_type;
            use std::os::unix::io::AsRawFd;

            let mut raw = MtGet::default();
            let ret = unsafe {
                libc::ioctl(
                    self.file.as_raw_fd(),
                    self.config.status_request as ioctl_num_type,
                    &mut raw as *mut MtGet,
                )
            };
            Errno::result(ret).map_err(io::Error::from)?;

            debug!(
                "MTIOCGET: fileno={}, blkno={}, gstat=0x{:08X}, resid={}",
                raw.mt_fileno, raw.mt_blkno, raw.mt_gstat, raw.mt_resid
            );
            Ok(raw)
        }

        #[cfg(not(target_os = "linux"))]
        fn mt_op(&self, _op: i16, _count: i32) -> io::Result<()> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "mtio control is only implemented for Linux",
            ))
        }

        #[cfg(not(target_os = "linux"))]
        fn mt_get(&self) -> io::Result<MtGet> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "mtio status is only implemented for Linux",
            ))
        }

        fn status(&self) -> io::Result<StatusSnapshot> {
            let raw = self.mt_get()?;
            Ok(decode_status(&raw, &self.config, self.mark_consumed))
        }
    }

    impl TapeIo for MtioTape {
        fn read_block(&mut self, buf: &mut [u8]) -> std::result::Result<usize, PrimitiveError> {
            match self.file.read(buf) {
                Ok(0) => {
                    if self.config.read_passes_file_mark {
                        self.mark_consumed = true;
                    }
                    Ok(0)
                }
                Ok(n) => Ok(n),
                Err(e) if e.raw_os_error() == Some(libc::ENOSPC) => Err(PrimitiveError::EndOfMedium),
                Err(e) if e.raw_os_error() == Some(libc::EIO) => match self.status() {
                    Ok(status) if status.end_of_medium => {
                        debug!("Read returned EIO at end of medium");
                        Err(PrimitiveError::EndOfMedium)
                    }
                    _ => Err(PrimitiveError::Io(e)),
                },
                Err(e) => Err(PrimitiveError::Io(e)),
            }
        }

        fn space_file_marks(&mut self, count: u32) -> io::Result<StatusSnapshot> {
            let pending = if self.mark_consumed {
                count.saturating_sub(1)
            } else {
                count
            };

            // The driver already stands past the mark; the flag is only
            // dropped once the new position has actually been reported.
            if pending == 0 {
                debug!("File mark already passed by read, no spacing needed");
                let status = decode_status(&self.mt_get()?, &self.config, false);
                self.mark_consumed = false;
                return Ok(status);
            }

            let mt_count = i32::try_from(pending).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("file mark count {} out of range", pending),
                )
            })?;

            if let Err(err) = self.mt_op(self.config.space_forward_file_op, mt_count) {
                // MTFSF fails with EIO when it runs into end of data
                if let Ok(raw) = self.mt_get() {
                    let status = decode_status(&raw, &self.config, false);
                    if status.end_of_medium {
                        debug!("Spacing stopped at end of medium");
                        self.mark_consumed = false;
                        return Ok(status);
                    }
                }
                return Err(err);
            }

            self.mark_consumed = false;
            self.status()
        }

        fn query_status(&mut self) -> io::Result<StatusSnapshot> {
            self.status()
        }
    }

    impl Drop for MtioTape {
        fn drop(&mut self) {
            debug!("Tape device closed: {}", self.device_path);
        }
    }
}

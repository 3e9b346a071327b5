//! Tape Access Module
//!
//! Record/file-mark reading of sequential tape devices: the session state
//! machine, the primitive trait it drives, and the available backends.

pub mod device;
pub mod mtio;
pub mod scripted;
pub mod session;
pub mod types;

pub use device::{PrimitiveError, TapeIo};
pub use mtio::MtioConfig;
pub use scripted::{CallCounts, ScriptedTape};
pub use session::TapeSession;
pub use types::{Boundary, Position, RecordEvent, SkipOutcome, StatusSnapshot};

#[cfg(unix)]
pub use mtio::MtioTape;

use crate::error::Result;

/// Type-erased backend used by the command layer
pub type DynTape = Box<dyn TapeIo + Send>;

#[cfg(unix)]
impl TapeSession<MtioTape> {
    /// Open a tape special file through the mtio backend
    pub fn open(device_path: &str, config: &MtioConfig) -> Result<Self> {
        let device = MtioTape::open(device_path, config.clone())?;
        Ok(Self::with_device(device))
    }
}

/// Open a session on a tape special file
pub fn open_session(device_path: &str, config: &MtioConfig) -> Result<TapeSession<DynTape>> {
    #[cfg(unix)]
    {
        let device = MtioTape::open(device_path, config.clone())?;
        Ok(TapeSession::with_device(Box::new(device) as DynTape))
    }

    #[cfg(not(unix))]
    {
        let _ = (device_path, config);
        Err(crate::error::TapeError::unsupported("Non-Unix platform"))
    }
}

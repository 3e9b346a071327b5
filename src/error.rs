use crate::tape::{Position, StatusSnapshot};
use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TapeError>;

/// Control-channel operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    SpaceFileMarks,
    QueryStatus,
}

impl fmt::Display for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlOp::SpaceFileMarks => write!(f, "space forward file marks"),
            ControlOp::QueryStatus => write!(f, "query status"),
        }
    }
}

/// Flat classification of [`TapeError`], handy for matching in caller retry policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccessDenied,
    DeviceNotFound,
    DeviceBusy,
    ReadFault,
    ControlFault,
    InvalidState,
    PositionDesync,
    Config,
    Unsupported,
    Io,
    Generic,
}

#[derive(Error, Debug)]
pub enum TapeError {
    #[error("Permission denied opening {path}: {source}")]
    AccessDenied {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Tape device not found: {path} ({source})")]
    DeviceNotFound {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Tape device busy: {path} ({source})")]
    DeviceBusy {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Read fault at {position}: {source}")]
    ReadFault {
        position: Position,
        #[source]
        source: io::Error,
    },

    #[error("Control fault during {operation} at {position}: {reason}")]
    ControlFault {
        operation: ControlOp,
        position: Position,
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("Operation {operation} is not valid at {position}")]
    InvalidState {
        operation: &'static str,
        position: Position,
    },

    #[error("Position desync: tracked {position}, device reports file {reported_file}")]
    PositionDesync {
        position: Position,
        reported_file: u64,
        snapshot: StatusSnapshot,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl TapeError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn unsupported<T: Into<String>>(msg: T) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Classify a failed open(2) of a tape special file
    pub fn from_open_error(path: &str, source: io::Error) -> Self {
        let path = path.to_string();

        #[cfg(unix)]
        if source.raw_os_error() == Some(libc::EBUSY) {
            return Self::DeviceBusy { path, source };
        }

        #[cfg(unix)]
        if matches!(source.raw_os_error(), Some(libc::ENXIO) | Some(libc::ENODEV)) {
            return Self::DeviceNotFound { path, source };
        }

        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::AccessDenied { path, source },
            io::ErrorKind::NotFound => Self::DeviceNotFound { path, source },
            _ => Self::Io(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Self::DeviceBusy { .. } => ErrorKind::DeviceBusy,
            Self::ReadFault { .. } => ErrorKind::ReadFault,
            Self::ControlFault { .. } => ErrorKind::ControlFault,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::PositionDesync { .. } => ErrorKind::PositionDesync,
            Self::Config(_) => ErrorKind::Config,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Io(_) => ErrorKind::Io,
            Self::Generic(_) => ErrorKind::Generic,
        }
    }

    /// Tracked position carried by session faults
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::ReadFault { position, .. }
            | Self::ControlFault { position, .. }
            | Self::InvalidState { position, .. }
            | Self::PositionDesync { position, .. } => Some(*position),
            _ => None,
        }
    }
}

//! tapewalk Library
//!
//! Sequential record/file-mark access to tape devices: a session state
//! machine over read and device-control primitives, a Linux mtio backend,
//! and a whole-tape traversal built on top.

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod logger;
pub mod tape;
pub mod traverse;

#[cfg(test)]
mod tests;

// Re-export key types for easier use
pub use error::{ErrorKind, Result, TapeError};
pub use tape::{
    open_session, Boundary, MtioConfig, Position, RecordEvent, ScriptedTape, SkipOutcome,
    StatusSnapshot, TapeIo, TapeSession,
};
pub use traverse::{traverse, TraversalEvent, TraversalOutcome, TraversalPolicy, TraversalReport};

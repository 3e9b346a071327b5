//! Command Handlers Module
//!
//! This module contains handlers for all CLI subcommands. Device access is
//! blocking, so each handler runs its session on the blocking thread pool.

pub mod dump;
pub mod scan;
pub mod skip;
pub mod status;

use rust_tapewalk::error::{Result, TapeError};

/// Run blocking tape work off the async runtime
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TapeError::Generic(e.into()))?
}

use crate::error::{Result, TapeError};
use tracing_subscriber::{fmt, EnvFilter, prelude::*};
use std::io;

pub fn init(verbose: bool, json: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(io::stderr);
        registry.with(fmt_layer).try_init()
    };

    result.map_err(|e| TapeError::Generic(e.into()))
}

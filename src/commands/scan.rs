//! Scan Command Handler
//!
//! Handles the `scan` subcommand: traverse the whole tape and summarize it.

use super::run_blocking;
use rust_tapewalk::config::AppConfig;
use rust_tapewalk::display;
use rust_tapewalk::error::Result;
use rust_tapewalk::tape::{self, TapeIo, TapeSession};
use rust_tapewalk::traverse::{traverse, TraversalEvent, TraversalReport};
use indicatif::ProgressBar;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub async fn execute(
    config: AppConfig,
    device: String,
    progress: bool,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    info!("Scanning tape device: {}", device);
    println!("Reading from tape device: {}", device);

    let bar = if progress {
        Some(display::byte_spinner()?)
    } else {
        None
    };

    let start = Instant::now();
    let worker_bar = bar.clone();
    let report = run_blocking(move || {
        let mut session = tape::open_session(&device, &config.mtio)?;
        let report = scan_session(&mut session, &config, &stop, worker_bar.as_ref());
        session.close();
        report
    })
    .await?;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    println!("Finished reading from tape device.");
    display::print_report(&report, start.elapsed());
    Ok(())
}

pub fn scan_session<D: TapeIo>(
    session: &mut TapeSession<D>,
    config: &AppConfig,
    stop: &AtomicBool,
    bar: Option<&ProgressBar>,
) -> Result<TraversalReport> {
    let mut buf = vec![0u8; config.block_size];

    traverse(session, &mut buf, &config.traversal, stop, |event| {
        match event {
            TraversalEvent::Record { file_index, record_index, data } => {
                debug!("Read {} bytes (file {} record {})", data.len(), file_index, record_index);
                if let Some(bar) = bar {
                    bar.inc(data.len() as u64);
                }
            }
            TraversalEvent::FileMark(summary) => {
                if let Some(bar) = bar {
                    bar.set_message(format!("file {} done", summary.file_index));
                }
            }
            TraversalEvent::EndOfMedium(position) => {
                debug!("End of medium at {}", position);
            }
        }
        Ok(())
    })
}

mod commands;

use rust_tapewalk::cli::{Cli, Commands};
use rust_tapewalk::config::AppConfig;
use rust_tapewalk::error::{Result, TapeError};
use rust_tapewalk::logger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse_args();

    // Initialize logging system
    logger::init(args.verbose, args.log_json)?;

    debug!("tapewalk starting");

    // Ctrl-C stops traversals between records
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current record");
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    match run(args, stop).await {
        Ok(_) => {
            info!("Operation completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Operation failed: {}", e);
            if let TapeError::AccessDenied { .. } = e {
                eprintln!("Try running the program with elevated permissions.");
            }
            std::process::exit(1);
        }
    }
}

async fn run(args: Cli, stop: Arc<AtomicBool>) -> Result<()> {
    let config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Scan {
            device,
            block_size,
            retries,
            progress,
        } => {
            let device = config.resolve_device(device)?;
            let mut config = config.with_block_size(block_size)?;
            if let Some(retries) = retries {
                config.traversal.max_read_retries = retries;
            }
            commands::scan::execute(config, device, progress, stop).await
        }

        Commands::Dump {
            output,
            device,
            block_size,
            max_files,
        } => {
            let device = config.resolve_device(device)?;
            let mut config = config.with_block_size(block_size)?;
            if max_files.is_some() {
                config.traversal.max_files = max_files;
            }
            commands::dump::execute(config, device, output, stop).await
        }

        Commands::Skip { count, device } => {
            let device = config.resolve_device(device)?;
            commands::skip::execute(config, device, count).await
        }

        Commands::Status { device, json } => {
            let device = config.resolve_device(device)?;
            commands::status::execute(config, device, json).await
        }
    }
}

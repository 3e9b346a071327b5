//! Dump Command Handler
//!
//! Handles the `dump` subcommand: copy every tape file to `file_NNNN.bin` in
//! the output directory and record a manifest with per-file SHA-256 digests.

use super::run_blocking;
use chrono::{DateTime, Utc};
use indicatif::BinaryBytes;
use rust_tapewalk::config::AppConfig;
use rust_tapewalk::error::{Result, TapeError};
use rust_tapewalk::tape::{self, TapeIo, TapeSession};
use rust_tapewalk::traverse::{traverse, TraversalEvent, TraversalOutcome};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MANIFEST_NAME: &str = "manifest.json";

#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub file_index: u64,
    pub name: String,
    pub records: u64,
    pub bytes: u64,
    pub sha256: String,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub device: String,
    pub created: DateTime<Utc>,
    pub block_size: usize,
    pub outcome: String,
    pub files: Vec<ManifestEntry>,
}

/// Output file currently being written
struct OpenFile {
    file_index: u64,
    name: String,
    writer: BufWriter<File>,
    hasher: Sha256,
    records: u64,
    bytes: u64,
}

struct DumpWriter<'a> {
    output: &'a Path,
    current: Option<OpenFile>,
    entries: Vec<ManifestEntry>,
}

impl<'a> DumpWriter<'a> {
    fn new(output: &'a Path) -> Self {
        Self {
            output,
            current: None,
            entries: Vec::new(),
        }
    }

    fn file_name(file_index: u64) -> String {
        format!("file_{:04}.bin", file_index)
    }

    fn open(&mut self, file_index: u64) -> Result<&mut OpenFile> {
        if self.current.as_ref().map(|f| f.file_index) != Some(file_index) {
            let name = Self::file_name(file_index);
            let path = self.output.join(&name);
            debug!("Creating {}", path.display());

            self.current = Some(OpenFile {
                file_index,
                name,
                writer: BufWriter::new(File::create(&path)?),
                hasher: Sha256::new(),
                records: 0,
                bytes: 0,
            });
        }

        self.current
            .as_mut()
            .ok_or_else(|| TapeError::Generic(anyhow::anyhow!("no output file open")))
    }

    fn record(&mut self, file_index: u64, data: &[u8]) -> Result<()> {
        let file = self.open(file_index)?;
        file.writer.write_all(data)?;
        file.hasher.update(data);
        file.records += 1;
        file.bytes += data.len() as u64;
        Ok(())
    }

    /// Close the file for `file_index`, creating it if it had no records
    fn finish(&mut self, file_index: u64, complete: bool) -> Result<()> {
        self.open(file_index)?;
        if let Some(mut file) = self.current.take() {
            file.writer.flush()?;
            let entry = ManifestEntry {
                file_index: file.file_index,
                name: file.name,
                records: file.records,
                bytes: file.bytes,
                sha256: hex::encode(file.hasher.finalize()),
                complete,
            };
            info!(
                "Wrote {} ({} records, {})",
                entry.name,
                entry.records,
                BinaryBytes(entry.bytes)
            );
            self.entries.push(entry);
        }
        Ok(())
    }
}

pub async fn execute(
    config: AppConfig,
    device: String,
    output: PathBuf,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    info!("Dumping tape device {} to {}", device, output.display());

    let manifest = run_blocking(move || {
        let mut session = tape::open_session(&device, &config.mtio)?;
        let manifest = dump_session(&mut session, &config, &device, &output, &stop);
        session.close();
        manifest
    })
    .await?;

    println!("\n✅ Dump completed ({})", manifest.outcome);
    for entry in &manifest.files {
        println!(
            "  {}  {:>8} records  {:>12}  {}",
            entry.name,
            entry.records,
            BinaryBytes(entry.bytes).to_string(),
            entry.sha256
        );
    }
    Ok(())
}

pub fn dump_session<D: TapeIo>(
    session: &mut TapeSession<D>,
    config: &AppConfig,
    device: &str,
    output: &Path,
    stop: &AtomicBool,
) -> Result<Manifest> {
    fs::create_dir_all(output)?;

    let mut writer = DumpWriter::new(output);
    let mut buf = vec![0u8; config.block_size];

    let result = traverse(session, &mut buf, &config.traversal, stop, |event| match event {
        TraversalEvent::Record { file_index, data, .. } => writer.record(file_index, data),
        TraversalEvent::FileMark(summary) => writer.finish(summary.file_index, true),
        TraversalEvent::EndOfMedium(_) => match writer.current.as_ref().map(|f| f.file_index) {
            Some(file_index) => writer.finish(file_index, false),
            None => Ok(()),
        },
    });

    let (outcome, error) = match result {
        Ok(report) => {
            let outcome = match report.outcome {
                TraversalOutcome::EndOfMedium => "end of medium",
                TraversalOutcome::Stopped => "stopped",
                TraversalOutcome::FileLimit => "file limit",
            };
            (outcome.to_string(), None)
        }
        Err(e) => {
            warn!("Dump interrupted: {}", e);
            (format!("failed: {}", e), Some(e))
        }
    };

    // Keep whatever was read so far, even on failure
    if let Some(file_index) = writer.current.as_ref().map(|f| f.file_index) {
        match writer.finish(file_index, false) {
            Ok(()) => {}
            Err(e) if error.is_some() => warn!("Could not close partial file {}: {}", file_index, e),
            Err(e) => return Err(e),
        }
    }

    let manifest = Manifest {
        device: device.to_string(),
        created: Utc::now(),
        block_size: config.block_size,
        outcome,
        files: writer.entries,
    };

    let manifest_path = output.join(MANIFEST_NAME);
    let file = File::create(&manifest_path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &manifest)
        .map_err(|e| TapeError::Generic(e.into()))?;
    info!("Manifest written: {}", manifest_path.display());

    match error {
        Some(e) => Err(e),
        None => Ok(manifest),
    }
}

//! Packaging pipeline: resolve → concurrent fetch+transcode → zip partition
//!
//! The orchestrator owns the concurrency fan-out and the partition
//! algorithm. Per-sticker failures are isolated: each task returns its own
//! result and the orchestrator aggregates them after the join, so one bad
//! sticker costs exactly one sticker and there is no shared mutable state
//! between workers.

use crate::config::PipelineConfig;
use crate::error::{Error, Result, TransportError};
use crate::telegram::TelegramClient;
use crate::transcode;
use crate::types::{ArchivePart, AssetFailure, AssetHandle, PackageReport, TranscodedFile};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Converts a named Telegram sticker pack into TamTam-importable archives
pub struct PackagingPipeline {
    telegram: TelegramClient,
    config: PipelineConfig,
}

impl PackagingPipeline {
    /// Create a pipeline over the given Telegram client
    pub fn new(telegram: TelegramClient, config: PipelineConfig) -> Self {
        Self { telegram, config }
    }

    /// Convert the named pack into zip archives of at most
    /// `max_archive_entries` stickers each
    ///
    /// Resolution failures ([`Error::PackNotFound`] / [`Error::Transport`])
    /// propagate unchanged so callers can pick the right user-facing
    /// message. Per-sticker failures do not: they are collected into
    /// [`PackageReport::failures`] and the remaining stickers are archived.
    /// An empty pack (or a pack where every sticker failed) yields zero
    /// archives and is not an error.
    pub async fn package(&self, name: &str) -> Result<PackageReport> {
        let pack = self.telegram.resolve(name).await?;
        info!(pack = %pack.name, stickers = pack.assets.len(), "packaging sticker pack");

        // One temp directory per run; dropped (and deleted) on every exit
        // path. Files that made it into an archive are removed eagerly
        // before that.
        let workdir = tempfile::Builder::new()
            .prefix(&format!("sticker-porter-{}-", pack.name))
            .tempdir()?;

        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));
        let mut tasks: JoinSet<std::result::Result<TranscodedFile, AssetFailure>> = JoinSet::new();

        for handle in pack.assets.iter().cloned() {
            let telegram = self.telegram.clone();
            let limit = limit.clone();
            let dir = workdir.path().to_path_buf();
            let pack_name = pack.name.clone();

            tasks.spawn(async move {
                let permit = limit.acquire_owned().await.map_err(|_| AssetFailure {
                    id: handle.id.clone(),
                    error: Error::Transport(TransportError::MalformedResponse {
                        reason: "worker pool closed".to_string(),
                    }),
                })?;
                let result = process_sticker(&telegram, handle.clone(), &dir, &pack_name).await;
                drop(permit);
                result.map_err(|error| AssetFailure {
                    id: handle.id,
                    error,
                })
            });
        }

        let mut converted = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            // A JoinError means a task panicked; that is a bug, not a
            // per-sticker condition, so it propagates.
            match joined? {
                Ok(file) => converted.push(file),
                Err(failure) => {
                    warn!(
                        sticker = %failure.id,
                        error = %failure.error,
                        "sticker failed, continuing with the rest"
                    );
                    failures.push(failure);
                }
            }
        }

        let archives = self.build_archives(&pack.name, converted).await?;
        info!(
            pack = %pack.name,
            archives = archives.len(),
            failed = failures.len(),
            "packaging finished"
        );

        Ok(PackageReport {
            name: pack.name,
            title: pack.title,
            archives,
            failures,
        })
    }

    /// Partition converted files into fixed-size chunks and zip each chunk
    async fn build_archives(
        &self,
        pack_name: &str,
        converted: Vec<TranscodedFile>,
    ) -> Result<Vec<ArchivePart>> {
        if converted.is_empty() {
            return Ok(Vec::new());
        }
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let mut archives = Vec::new();
        for (sequence_number, chunk) in converted
            .chunks(self.config.max_archive_entries.max(1))
            .enumerate()
        {
            let zip_path = self
                .config
                .output_dir
                .join(format!("{pack_name}_{sequence_number}.zip"));
            let members: Vec<PathBuf> = chunk.iter().map(|f| f.local_path.clone()).collect();

            // Zip construction is blocking file I/O.
            let path_for_task = zip_path.clone();
            let member_count = tokio::task::spawn_blocking(move || {
                write_archive(&path_for_task, &members)
            })
            .await??;

            archives.push(ArchivePart {
                path: zip_path,
                sequence_number,
                member_count,
            });
        }
        Ok(archives)
    }
}

/// Fetch one sticker, transcode it, and write the PNG into the temp dir
async fn process_sticker(
    telegram: &TelegramClient,
    handle: AssetHandle,
    dir: &Path,
    pack_name: &str,
) -> Result<TranscodedFile> {
    debug!(sticker = %handle.id, "processing sticker");
    let raw = telegram.fetch(&handle).await?;

    // CPU-bound; keep it off the async workers.
    let png = tokio::task::spawn_blocking(move || transcode::transcode(&raw.bytes)).await??;

    // Random suffix keeps names unique within the shared temp directory.
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect();
    let local_path = dir.join(format!(
        "{pack_name}_{suffix}.{}",
        transcode::OUTPUT_EXTENSION
    ));
    tokio::fs::write(&local_path, &png).await?;

    debug!(sticker = %handle.id, path = %local_path.display(), "sticker transcoded");
    Ok(TranscodedFile { local_path, handle })
}

/// Write one zip archive; each member is stored under its base filename and
/// deleted from the temp directory right after being added
fn write_archive(zip_path: &Path, members: &[PathBuf]) -> Result<usize> {
    let file = std::fs::File::create(zip_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for member in members {
        let entry_name = member
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::Io(std::io::Error::other(format!(
                    "member has no file name: {}",
                    member.display()
                )))
            })?;

        debug!(archive = %zip_path.display(), entry = %entry_name, "adding to archive");
        writer.start_file(entry_name, options)?;
        writer.write_all(&std::fs::read(member)?)?;
        std::fs::remove_file(member)?;
        count += 1;
    }

    writer.finish()?;
    Ok(count)
}

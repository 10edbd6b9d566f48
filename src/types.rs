//! Core data types flowing through the conversion pipeline

use crate::error::Error;
use std::path::PathBuf;

/// Identifies one remote sticker within a resolved pack
///
/// Immutable once obtained from [`crate::telegram::TelegramClient::resolve`];
/// created per resolution call and discarded after its sticker is processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetHandle {
    /// Telegram file id, resolvable to a download location
    pub id: String,
    /// Emoji associated with the sticker
    pub emoji: String,
    /// Whether the sticker is animated (`.tgs` Lottie or `.webm` video)
    ///
    /// Animated stickers have no directly decodable raster body; the fetcher
    /// falls back to the thumbnail rendition when one is available.
    pub is_animated: bool,
    /// File id of the sticker's raster thumbnail, when Telegram provides one
    pub thumb_id: Option<String>,
}

/// A resolved sticker pack
///
/// `name` is the stable machine identifier used both for the Telegram lookup
/// and for naming the produced archives; `title` is display-only. An empty
/// `assets` list is a valid, if unusual, resolution result.
#[derive(Clone, Debug)]
pub struct StickerPack {
    /// Stable machine name of the pack
    pub name: String,
    /// Human-readable title
    pub title: String,
    /// Stickers in pack order
    pub assets: Vec<AssetHandle>,
}

/// Raw sticker bytes as downloaded from Telegram
///
/// Owned exclusively by the fetch task that produced it until handed to the
/// transcoder; never persisted beyond the pipeline run.
#[derive(Clone, Debug)]
pub struct RawAsset {
    /// The handle this download belongs to
    pub handle: AssetHandle,
    /// Downloaded bytes
    pub bytes: Vec<u8>,
    /// Remote path the bytes came from (for diagnostics)
    pub source_path: String,
}

/// One transcoded sticker written to the pipeline's temporary directory
#[derive(Clone, Debug)]
pub struct TranscodedFile {
    /// Location inside the pipeline-scoped temp directory
    pub local_path: PathBuf,
    /// The handle the file was produced from
    pub handle: AssetHandle,
}

/// One produced archive, a bounded shard of the converted pack
#[derive(Clone, Debug)]
pub struct ArchivePart {
    /// Path of the zip file on disk
    pub path: PathBuf,
    /// 0-based position within the pack; contiguous across all parts
    pub sequence_number: usize,
    /// Number of stickers stored in this archive (never exceeds the
    /// configured per-archive cap)
    pub member_count: usize,
}

/// TamTam's reference to an uploaded archive
///
/// Consumed to build the file attachment of the notification message.
#[derive(Clone, Debug)]
pub struct UploadReceipt {
    /// TamTam-side file id
    pub remote_file_id: String,
    /// Attachment token for `sendMessage`
    pub upload_token: String,
}

/// Failure of a single sticker's fetch or transcode step
#[derive(Debug)]
pub struct AssetFailure {
    /// Telegram file id of the failing sticker
    pub id: String,
    /// What went wrong
    pub error: Error,
}

/// Outcome of packaging one sticker pack
///
/// Per-sticker failures are isolated: `archives` covers every sticker that
/// converted, `failures` names the ones that did not.
#[derive(Debug)]
pub struct PackageReport {
    /// Machine name of the pack (also the archive name prefix)
    pub name: String,
    /// Display title of the pack
    pub title: String,
    /// Produced archives in partition order
    pub archives: Vec<ArchivePart>,
    /// Stickers that failed to fetch or transcode
    pub failures: Vec<AssetFailure>,
}

impl PackageReport {
    /// Total stickers stored across all archives
    pub fn member_total(&self) -> usize {
        self.archives.iter().map(|part| part.member_count).sum()
    }
}

//! # sticker-porter
//!
//! Backend library for porting Telegram sticker packs to TamTam.
//!
//! Given a pack name, the pipeline resolves it against the Telegram Bot
//! API, fetches every sticker concurrently, transcodes each one to PNG,
//! partitions the results into zip archives of at most 50 entries (the
//! TamTam importer's limit), and can then upload the archives and notify a
//! TamTam user — retrying the one known-transient "file not processed yet"
//! condition with bounded linear backoff.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - no CLI or HTTP server, purely a crate for embedding
//! - **Failure isolation** - one bad sticker never sinks the whole pack
//! - **Typed boundaries** - every platform response is validated into
//!   explicit structs at the edge
//!
//! ## Quick Start
//!
//! ```no_run
//! use sticker_porter::{
//!     Config, PackagingPipeline, TamTamClient, TelegramClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config: Config = serde_json::from_str(
//!         r#"{
//!             "telegram": { "bot_token": "..." },
//!             "tamtam": { "access_token": "..." }
//!         }"#,
//!     )?;
//!
//!     let telegram = TelegramClient::new(&config.telegram);
//!     let pipeline = PackagingPipeline::new(telegram, config.pipeline.clone());
//!     let report = pipeline.package("my_favorite_pack").await?;
//!
//!     let tamtam = TamTamClient::new(&config.tamtam, config.send_retry.clone());
//!     tamtam.deliver(123456789, &report.archives).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// TamTam upload and notification with bounded retry
pub mod delivery;
/// Error types
pub mod error;
/// Packaging pipeline (fetch, transcode, partition, zip)
pub mod pipeline;
/// Telegram Bot API client (pack resolution, sticker fetching)
pub mod telegram;
/// Sticker-to-PNG transcoding
pub mod transcode;
/// Core data types
pub mod types;

// Re-export commonly used types
pub use config::{Config, PipelineConfig, SendRetryConfig, TamTamConfig, TelegramConfig};
pub use delivery::TamTamClient;
pub use error::{Error, Result, TransportError};
pub use pipeline::PackagingPipeline;
pub use telegram::TelegramClient;
pub use types::{
    ArchivePart, AssetFailure, AssetHandle, PackageReport, RawAsset, StickerPack, TranscodedFile,
    UploadReceipt,
};

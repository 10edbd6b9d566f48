//! Telegram Bot API client: pack resolution and sticker fetching
//!
//! All responses are deserialized into explicit structs and validated at the
//! boundary; a shape mismatch fails fast with
//! [`TransportError::MalformedResponse`] instead of leaking loosely-typed
//! data into the pipeline.

use crate::config::TelegramConfig;
use crate::error::{Error, Result, TransportError};
use crate::types::{AssetHandle, RawAsset, StickerPack};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Standard Telegram Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// `getStickerSet` result payload
#[derive(Debug, Deserialize)]
struct StickerSetDto {
    name: String,
    title: String,
    stickers: Vec<StickerDto>,
}

#[derive(Debug, Deserialize)]
struct StickerDto {
    file_id: String,
    #[serde(default)]
    emoji: Option<String>,
    #[serde(default)]
    is_animated: bool,
    #[serde(default)]
    is_video: bool,
    // Older API levels call this field `thumb`
    #[serde(default, alias = "thumb")]
    thumbnail: Option<ThumbnailDto>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailDto {
    file_id: String,
}

/// `getFile` result payload: the download location of one file
#[derive(Debug, Deserialize)]
struct FileDto {
    file_id: String,
    #[allow(dead_code)]
    file_unique_id: String,
    #[serde(default)]
    file_size: Option<u64>,
    file_path: Option<String>,
}

/// Client for the source platform (Telegram)
///
/// Covers the three operations the pipeline consumes: lookup-by-name,
/// file-location resolution, and file download. Cheap to clone; the inner
/// HTTP client is shared.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    /// Create a client from configuration
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    /// Call one Bot API method and unwrap the response envelope
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> std::result::Result<T, TransportError> {
        let url = self.method_url(method);
        debug!(method, ?params, "telegram api request");

        let response = self.http.get(&url).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // Telegram reports API-level failures as a JSON envelope with a
        // non-2xx status, so parse the envelope before judging the status.
        let envelope: ApiEnvelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Err(e) => {
                return Err(TransportError::MalformedResponse {
                    reason: format!("{method}: {e}"),
                });
            }
        };

        if !envelope.ok {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: envelope.description.unwrap_or(body),
            });
        }

        envelope
            .result
            .ok_or_else(|| TransportError::MalformedResponse {
                reason: format!("{method}: ok envelope without result"),
            })
    }

    /// Resolve a pack name to its ordered sticker handles and metadata
    ///
    /// Returns [`Error::PackNotFound`] when Telegram explicitly reports the
    /// name does not exist; any other failure stays a transport error.
    pub async fn resolve(&self, name: &str) -> Result<StickerPack> {
        let set: StickerSetDto = self
            .call("getStickerSet", &[("name", name)])
            .await
            .map_err(|e| match e {
                TransportError::Status { ref body, .. } if is_missing_set(body) => {
                    Error::PackNotFound {
                        name: name.to_string(),
                    }
                }
                other => Error::Transport(other),
            })?;

        let assets = set
            .stickers
            .into_iter()
            .map(|sticker| AssetHandle {
                id: sticker.file_id,
                emoji: sticker.emoji.unwrap_or_default(),
                is_animated: sticker.is_animated || sticker.is_video,
                thumb_id: sticker.thumbnail.map(|thumb| thumb.file_id),
            })
            .collect::<Vec<_>>();

        debug!(pack = %set.name, stickers = assets.len(), "resolved sticker pack");

        Ok(StickerPack {
            name: set.name,
            title: set.title,
            assets,
        })
    }

    /// Fetch one sticker's raw bytes
    ///
    /// Two independent network calls: `getFile` for the download location,
    /// then the file download itself. Either failure is tagged with the
    /// sticker id so the orchestrator can attribute it without losing the
    /// rest of the pack. No retry is applied here; that is the caller's
    /// policy decision.
    ///
    /// Animated stickers are served as gzipped Lottie (or `.webm` video),
    /// which has no decodable raster body — for those the thumbnail
    /// rendition is fetched instead when Telegram provides one.
    pub async fn fetch(&self, handle: &AssetHandle) -> Result<RawAsset> {
        let file_id = match (&handle.is_animated, &handle.thumb_id) {
            (true, Some(thumb_id)) => thumb_id.as_str(),
            _ => handle.id.as_str(),
        };

        let raw = self
            .fetch_by_file_id(file_id)
            .await
            .map_err(|e| e.for_asset(handle.id.clone()))?;

        Ok(RawAsset {
            handle: handle.clone(),
            bytes: raw.0,
            source_path: raw.1,
        })
    }

    async fn fetch_by_file_id(
        &self,
        file_id: &str,
    ) -> std::result::Result<(Vec<u8>, String), TransportError> {
        let file: FileDto = self.call("getFile", &[("file_id", file_id)]).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| TransportError::MalformedResponse {
                reason: format!("getFile: no file_path for {}", file.file_id),
            })?;

        debug!(
            file_id = %file.file_id,
            size = ?file.file_size,
            path = %file_path,
            "downloading sticker file"
        );

        let response = self.http.get(self.file_url(&file_path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), file_path))
    }
}

/// Does an API error description say the sticker set itself is missing?
///
/// Telegram phrases this as `Bad Request: STICKERSET_INVALID`; match
/// defensively on the ways "no such set" has been spelled.
fn is_missing_set(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower.contains("stickerset_invalid") || lower.contains("sticker set not found")
}

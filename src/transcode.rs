//! Sticker transcoding into TamTam's required raster format
//!
//! Pure functions over byte slices: no I/O, no shared state, safe to call
//! from any number of threads at once. The pipeline relies on that to run
//! transcodes on the blocking pool without synchronization.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use image::{ImageFormat, ImageReader};
use std::io::{Cursor, Read};

/// File extension of everything this module emits
pub const OUTPUT_EXTENSION: &str = "png";

/// Magic prefix of a gzip stream (how `.tgs` stickers arrive)
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Uncompressed Lottie documents can be large; cap what we are willing to
/// inflate just to classify the input.
const MAX_INFLATED_BYTES: u64 = 8 * 1024 * 1024;

/// Convert one sticker's bytes into a PNG
///
/// Accepts the raster formats Telegram serves stickers in (WEBP, PNG, JPEG,
/// GIF — for animated GIF/WEBP the first frame is used) and recognizes the
/// animated `.tgs` container. Returns [`Error::UnsupportedFormat`] when the
/// bytes cannot be decoded; the message names the sticker-specific condition
/// so batch callers can report it per asset.
pub fn transcode(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.starts_with(&GZIP_MAGIC) {
        return Err(classify_gzip(bytes));
    }

    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let Some(format) = reader.format() else {
        return Err(Error::UnsupportedFormat(
            "unrecognized image container".to_string(),
        ));
    };

    let decoded = reader
        .decode()
        .map_err(|e| Error::UnsupportedFormat(format!("{format:?} decode failed: {e}")))?;

    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| Error::UnsupportedFormat(format!("PNG encode failed: {e}")))?;
    Ok(out.into_inner())
}

/// Name the condition behind a gzip-wrapped sticker body
///
/// A gzip stream holding a JSON document is an animated Lottie sticker; the
/// fetcher normally avoids this path by downloading the raster thumbnail
/// rendition, so landing here means no rendition was available. Either way
/// the input is not convertible, but the error should say which case it was.
fn classify_gzip(bytes: &[u8]) -> Error {
    let mut inflated = Vec::new();
    let mut decoder = GzDecoder::new(bytes).take(MAX_INFLATED_BYTES);
    if decoder.read_to_end(&mut inflated).is_err() {
        return Error::UnsupportedFormat("corrupt gzip stream".to_string());
    }

    if serde_json::from_slice::<serde_json::Value>(&inflated).is_ok() {
        Error::UnsupportedFormat(
            "animated Lottie sticker without a raster rendition".to_string(),
        )
    } else {
        Error::UnsupportedFormat("gzip stream does not contain a decodable image".to_string())
    }
}

//! Cover art sizing and preparation.
//!
//! Covers are requested from the track's image template at the configured
//! size, then normalised so the bytes handed to the embedder are always a
//! JPEG no larger than the configured edge. The embedded MIME type is
//! therefore always `image/jpeg`.

mod embedded;

pub use embedded::{EmbeddedPicture, list_pictures};

use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// JPEG quality used when re-encoding covers.
const JPEG_QUALITY: u8 = 90;

/// Requested cover resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverSize {
    /// 500x500
    Standard,
    /// 1000x1000 (default)
    #[default]
    Large,
    /// Original upload
    Max,
}

impl CoverSize {
    /// Value substituted for `{size}` in the image template.
    pub fn as_param(self) -> &'static str {
        match self {
            CoverSize::Standard => "500x500",
            CoverSize::Large => "1000x1000",
            CoverSize::Max => "max",
        }
    }
}

/// Expand an image template into a fetchable URL.
pub fn cover_url(template: &str, size: CoverSize) -> String {
    template.replace("{size}", size.as_param())
}

/// Normalise downloaded cover bytes.
///
/// JPEGs within `max_edge` pass through untouched. Anything else is
/// decoded, downscaled (aspect preserved) and re-encoded as JPEG. Bytes
/// that cannot be decoded are returned as received.
pub fn normalise(data: Vec<u8>, max_edge: u32) -> Vec<u8> {
    let is_jpeg = matches!(image::guess_format(&data), Ok(ImageFormat::Jpeg));

    let decoded = match image::load_from_memory(&data) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!(error = %e, "Cover not decodable, embedding as received");
            return data;
        }
    };

    let oversized = decoded.width() > max_edge || decoded.height() > max_edge;
    if is_jpeg && !oversized {
        return data;
    }

    let resized = if oversized {
        decoded.thumbnail(max_edge, max_edge)
    } else {
        decoded
    };

    let rgb = resized.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    let encoded = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb);
    match encoded {
        Ok(()) => {
            tracing::debug!(
                width = rgb.width(),
                height = rgb.height(),
                "Cover re-encoded as JPEG"
            );
            out.into_inner()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cover re-encode failed, embedding as received");
            data
        }
    }
}

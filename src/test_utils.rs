//! Test utilities and fixtures for zvuk-dl tests.
//!
//! Provides a config pointed at a mock server, JSON builders for service
//! payloads, and the smallest audio files lofty will accept.
//!
//! # Example
//!
//! ```ignore
//! use zvuk_dl::test_utils::{test_config, track_json};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let server = wiremock::MockServer::start().await;
//!     let config = test_config(&server.uri());
//!     // ... mount mocks returning track_json(1, "Song", 1)
//! }
//! ```

use serde_json::{Value, json};
use std::path::Path;

use crate::config::Config;

/// A config aimed at `base_url` with no pauses and fast retries.
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.service.base_url = base_url.to_string();
    config.service.token = "test-token".to_string();

    config.network.concurrent_requests = 2;
    config.network.max_retries = 2;
    config.network.retry_delay_ms = 1;
    config.network.throttle_multiplier = 1;
    config.network.politeness_min_ms = 0;
    config.network.politeness_max_ms = 0;
    config.network.timeout_secs = 5;
    config.network.stream_timeout_secs = 5;
    config.network.page_delay_ms = 0;

    config.download.verify_quality = false;
    config
}

/// Same as [`test_config`], writing into `output_dir`.
pub fn test_config_in(base_url: &str, output_dir: &Path) -> Config {
    let mut config = test_config(base_url);
    config.download.output_dir = output_dir.to_path_buf();
    config
}

/// Track detail as the tracks endpoint returns it.
///
/// Has no image and no quality evidence; tests add those fields when needed.
pub fn track_json(id: u64, title: &str, position: u32) -> Value {
    json!({
        "id": id,
        "title": title,
        "artist_names": ["Test Artist"],
        "release_title": "Test Album",
        "position": position,
        "release_date": "2023-05-01",
        "duration": 180,
        "genres": []
    })
}

/// Release detail as the releases endpoint returns it.
pub fn release_json(id: u64, title: &str, track_ids: &[u64]) -> Value {
    json!({
        "id": id,
        "title": title,
        "type": "album",
        "track_ids": track_ids,
        "date": 20230501,
        "artist_names": ["Test Artist"]
    })
}

/// PADDING carried by [`minimal_flac`], as encoders usually leave some.
const FIXTURE_PADDING: usize = 512;

/// A FLAC stream with STREAMINFO (44.1 kHz, stereo, 16 bit, zero samples)
/// followed by a PADDING block.
pub fn minimal_flac() -> Vec<u8> {
    let mut data = bare_flac();
    // STREAMINFO is no longer the last block
    data[4] = 0x00;
    // Last metadata block, PADDING
    data.push(0x81);
    data.extend_from_slice(&(FIXTURE_PADDING as u32).to_be_bytes()[1..]);
    data.extend_from_slice(&[0; FIXTURE_PADDING]);
    data
}

/// A FLAC stream whose only metadata block is STREAMINFO, flagged last.
pub fn bare_flac() -> Vec<u8> {
    let mut data = b"fLaC".to_vec();
    // Last metadata block, STREAMINFO, 34 bytes
    data.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
    // Min/max block size 4096
    data.extend_from_slice(&[0x10, 0x00, 0x10, 0x00]);
    // Min/max frame size unknown
    data.extend_from_slice(&[0; 6]);
    // Sample rate, channels, bits per sample, total samples
    data.extend_from_slice(&[0x0A, 0xC4, 0x42, 0xF0, 0x00, 0x00, 0x00, 0x00]);
    // MD5
    data.extend_from_slice(&[0; 16]);
    data
}

/// A few silent MPEG-1 Layer III frames (128 kbps, 44.1 kHz).
pub fn minimal_mp3() -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut data = Vec::with_capacity(FRAME_LEN * 8);
    for _ in 0..8 {
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
        data.extend_from_slice(&frame);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_valid() {
        let config = test_config("http://127.0.0.1:1");
        assert!(config.validate().is_ok());
        assert_eq!(config.network.politeness_max_ms, 0);
    }

    #[test]
    fn test_minimal_flac_layout() {
        let flac = minimal_flac();
        assert_eq!(&flac[..4], b"fLaC");
        assert_eq!(flac.len(), 4 + 4 + 34 + 4 + FIXTURE_PADDING);
        assert_eq!(flac[4], 0x00);
        assert_eq!(flac[42], 0x81);

        let bare = bare_flac();
        assert_eq!(bare.len(), 4 + 4 + 34);
        assert_eq!(bare[4], 0x80);
    }

    #[test]
    fn test_track_json_fields() {
        let track = track_json(7, "Song", 3);
        assert_eq!(track["id"], 7);
        assert_eq!(track["position"], 3);
        assert!(track.get("image").is_none());
    }
}

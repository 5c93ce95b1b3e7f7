//! Single-track flow.
//!
//! track info -> quality -> stream location -> stream to disk -> tags ->
//! lyrics sidecars. Anything before the audio is on disk is terminal for the
//! track; failures after that are logged and never undo the download.

use std::path::{Path, PathBuf};
use tokio::task::JoinError;

use super::{Downloader, UnitKind};
use crate::cover::{cover_url, normalise};
use crate::error::{Error, Result};
use crate::lyrics::{Lyrics, to_srt};
use crate::metadata::{self, Container, MetadataError};
use crate::model::TrackRecord;
use crate::organizer::{sidecar_path, track_file_name};
use crate::quality::{QualityProbe, Tier, recommend};
use crate::service::ServiceError;

/// A track whose audio reached the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOutcome {
    pub track_id: u64,
    pub path: PathBuf,
    pub tier: Tier,
    pub bytes: u64,
    /// Tags were written successfully
    pub tagged: bool,
}

impl Downloader {
    /// Download one track into `dir`.
    ///
    /// Returns the outcome when the audio was written; failures are recorded
    /// in the run's failure list and yield `None`.
    pub async fn download_track(
        &self,
        track_id: u64,
        dir: &Path,
        position: Option<u32>,
    ) -> Option<TrackOutcome> {
        self.run_track(track_id, None, dir, position).await
    }

    /// Same as [`Downloader::download_track`], reusing an already fetched
    /// record when there is one.
    pub(super) async fn run_track(
        &self,
        track_id: u64,
        known: Option<TrackRecord>,
        dir: &Path,
        position: Option<u32>,
    ) -> Option<TrackOutcome> {
        match self.acquire(track_id, known, dir, position).await {
            Ok(outcome) => {
                tracing::info!(
                    track_id,
                    quality = %outcome.tier,
                    bytes = outcome.bytes,
                    path = %outcome.path.display(),
                    "Track downloaded"
                );
                Some(outcome)
            }
            Err(e) => {
                self.stats.record_failure();
                self.record_failure(UnitKind::Track, track_id, &e);
                None
            }
        }
    }

    async fn acquire(
        &self,
        track_id: u64,
        known: Option<TrackRecord>,
        dir: &Path,
        position: Option<u32>,
    ) -> Result<TrackOutcome> {
        // Step 1: Track info
        let track = match known {
            Some(track) => track,
            None => self.client.track(track_id).await?,
        };

        // Step 2: Quality and stream location
        let (tier, url) = self.resolve_stream(&track).await?;

        // Step 3: Audio
        let path = dir.join(track_file_name(&track, tier, position));
        let bytes = self
            .client
            .transport()
            .stream_to_file(&url, &path)
            .await?;
        self.stats.record_success(bytes);

        // Step 4: Tags and sidecars (never fail the track)
        let lyrics = self.fetch_lyrics(&track).await;
        let tagged = if self.config.download.embed_metadata {
            self.embed(&track, tier, &path, lyrics.as_ref()).await
        } else {
            false
        };
        if let Some(lyrics) = &lyrics {
            self.write_sidecars(&path, lyrics).await;
        }

        Ok(TrackOutcome {
            track_id: track.id,
            path,
            tier,
            bytes,
            tagged,
        })
    }

    /// Pick the tier and get its stream location.
    ///
    /// With verification on, every tier is probed first and the fallback
    /// policy is applied to the probe. Otherwise the stream lookups decide:
    /// the requested tier is asked for and, with fallback on, lower tiers
    /// follow while the service reports "not offered".
    async fn resolve_stream(&self, track: &TrackRecord) -> Result<(Tier, String)> {
        let requested = self.config.download.quality;
        let fallback = self.config.download.fallback_to_lower_quality;

        if self.config.download.verify_quality {
            let probe = self.resolver.probe_record(track).await;
            let tier = choose_tier(&probe, requested, fallback).ok_or_else(|| {
                Error::QualityUnavailable {
                    track_id: track.id,
                    requested,
                    available: probe.available_tiers(),
                }
            })?;
            if tier != requested {
                tracing::info!(track_id = track.id, %requested, chosen = %tier, "Falling back");
            }
            let url = self.client.stream_url(track.id, tier).await?;
            return Ok((tier, url));
        }

        for tier in candidate_tiers(requested, fallback) {
            match self.client.stream_url(track.id, tier).await {
                Ok(url) => {
                    if tier != requested {
                        tracing::info!(track_id = track.id, %requested, chosen = %tier, "Falling back");
                    }
                    return Ok((tier, url));
                }
                Err(ServiceError::NotFound { .. }) if fallback => {
                    tracing::debug!(track_id = track.id, quality = %tier, "Tier not offered");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::QualityUnavailable {
            track_id: track.id,
            requested,
            available: Vec::new(),
        })
    }

    /// Lyrics are only fetched when something will use them.
    async fn fetch_lyrics(&self, track: &TrackRecord) -> Option<Lyrics> {
        let dl = &self.config.download;
        let wanted =
            (dl.embed_metadata && dl.embed_lyrics) || dl.save_lyrics || dl.save_subtitles;
        if !wanted {
            return None;
        }

        match self.client.lyrics(track.id).await {
            Ok(raw) => raw.map(|text| Lyrics::classify(&text)),
            Err(e) => {
                tracing::warn!(track_id = track.id, error = %e, "Lyrics lookup failed");
                None
            }
        }
    }

    async fn fetch_cover(&self, track: &TrackRecord) -> Option<Vec<u8>> {
        let template = track.cover_template.as_deref()?;
        let url = cover_url(template, self.config.download.cover_size);

        let data = match self.client.transport().fetch_bytes(&url).await {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                tracing::warn!(track_id = track.id, "Cover was empty");
                return None;
            }
            Err(e) => {
                tracing::warn!(track_id = track.id, error = %e, "Cover download failed");
                return None;
            }
        };

        let max_edge = self.config.download.cover_max_edge;
        match tokio::task::spawn_blocking(move || normalise(data, max_edge)).await {
            Ok(cover) => {
                self.stats.record_cover();
                Some(cover)
            }
            Err(e) => {
                tracing::warn!(track_id = track.id, error = %e, "Cover preparation failed");
                None
            }
        }
    }

    /// Write tags; a failure is recorded but the audio stays.
    async fn embed(
        &self,
        track: &TrackRecord,
        tier: Tier,
        path: &Path,
        lyrics: Option<&Lyrics>,
    ) -> bool {
        let cover = if self.config.download.embed_cover {
            self.fetch_cover(track).await
        } else {
            None
        };
        let lyrics = lyrics
            .filter(|_| self.config.download.embed_lyrics)
            .cloned();

        let container = Container::for_tier(tier);
        let (file, record) = (path.to_path_buf(), track.clone());
        let result = tokio::task::spawn_blocking(move || {
            metadata::embed(&file, container, &record, lyrics.as_ref(), cover.as_deref())
        })
        .await;

        self.settle_embed(track.id, path, result)
    }

    /// Count a tag write, or record it as a `TagWrite` failure whether the
    /// writer returned an error or its task died.
    fn settle_embed(
        &self,
        track_id: u64,
        path: &Path,
        result: std::result::Result<std::result::Result<(), MetadataError>, JoinError>,
    ) -> bool {
        let error = match result {
            Ok(Ok(())) => {
                self.stats.record_metadata();
                return true;
            }
            Ok(Err(e)) => e,
            Err(e) => {
                tracing::warn!(track_id, error = %e, "Tag writer did not finish");
                MetadataError::Aborted {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        };
        self.record_failure(UnitKind::Track, track_id, &Error::Metadata(error));
        false
    }

    async fn write_sidecars(&self, audio: &Path, lyrics: &Lyrics) {
        let dl = &self.config.download;

        if dl.save_lyrics {
            let (extension, text) = match lyrics.lrc() {
                Some(raw) => ("lrc", raw.to_string()),
                None => ("txt", lyrics.plain_text()),
            };
            write_sidecar(sidecar_path(audio, extension), text).await;
        }

        if dl.save_subtitles
            && let Some(lines) = lyrics.timed_lines()
        {
            write_sidecar(sidecar_path(audio, "srt"), to_srt(lines)).await;
        }
    }
}

async fn write_sidecar(path: PathBuf, contents: String) {
    match tokio::fs::write(&path, contents).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Sidecar written"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Sidecar write failed"),
    }
}

/// Apply the fallback policy to a probe.
///
/// A tier other than `requested` is only acceptable with fallback on.
pub(crate) fn choose_tier(probe: &QualityProbe, requested: Tier, fallback: bool) -> Option<Tier> {
    recommend(probe, requested).filter(|&tier| tier == requested || fallback)
}

/// Tiers to ask for without probing: the requested one, then (with
/// fallback) everything below it.
fn candidate_tiers(requested: Tier, fallback: bool) -> Vec<Tier> {
    let mut tiers = vec![requested];
    if fallback {
        tiers.extend(
            Tier::ORDER
                .into_iter()
                .skip_while(|&t| t != requested)
                .skip(1),
        );
    }
    tiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::test_utils::{bare_flac, minimal_flac, test_config_in, track_json};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe_with(tiers: &[Tier]) -> QualityProbe {
        let mut probe = QualityProbe::new(116136641);
        for tier in tiers {
            probe.confirm(*tier, None);
        }
        probe
    }

    #[test]
    fn test_fallback_policy_scenario() {
        let probe = probe_with(&[Tier::High]);
        assert_eq!(choose_tier(&probe, Tier::Lossless, true), Some(Tier::High));
        assert_eq!(choose_tier(&probe, Tier::Lossless, false), None);
    }

    #[test]
    fn test_requested_tier_needs_no_fallback() {
        let probe = probe_with(&[Tier::Lossless, Tier::Mid]);
        assert_eq!(choose_tier(&probe, Tier::Mid, false), Some(Tier::Mid));
        assert_eq!(choose_tier(&QualityProbe::new(1), Tier::Mid, true), None);
    }

    #[test]
    fn test_candidate_tiers() {
        assert_eq!(
            candidate_tiers(Tier::Lossless, true),
            vec![Tier::Lossless, Tier::High, Tier::Mid]
        );
        assert_eq!(candidate_tiers(Tier::High, true), vec![Tier::High, Tier::Mid]);
        assert_eq!(candidate_tiers(Tier::Lossless, false), vec![Tier::Lossless]);
    }

    async fn mount_track(server: &MockServer, id: u64) {
        Mock::given(method("GET"))
            .and(path("/api/tiny/tracks"))
            .and(query_param("ids", id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"tracks": {id.to_string(): track_json(id, "Song", 1)}}
            })))
            .mount(server)
            .await;
    }

    async fn mount_lyrics(server: &MockServer, text: &str) {
        Mock::given(method("GET"))
            .and(path("/api/tiny/lyrics"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": {"lyrics": text}})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_single_track_with_sidecars() {
        let server = MockServer::start().await;
        let out = tempdir().unwrap();
        mount_track(&server, 7).await;
        mount_lyrics(&server, "[00:12.50]Hello\n[00:15.00]World").await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .and(query_param("quality", "flac"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"stream": format!("{}/cdn/7.flac", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/7.flac"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/flac")
                    .set_body_bytes(minimal_flac()),
            )
            .mount(&server)
            .await;

        let mut config = test_config_in(&server.uri(), out.path());
        config.download.save_lyrics = true;
        config.download.save_subtitles = true;
        let downloader = Downloader::new(Arc::new(config)).unwrap();

        let outcome = downloader
            .download_track(7, out.path(), None)
            .await
            .expect("track should download");

        assert_eq!(outcome.tier, Tier::Lossless);
        assert!(outcome.tagged);
        assert_eq!(
            outcome.path.file_name().unwrap().to_str().unwrap(),
            "Test Artist - Song.flac"
        );

        let lrc = std::fs::read_to_string(out.path().join("Test Artist - Song.lrc")).unwrap();
        assert_eq!(lrc, "[00:12.50]Hello\n[00:15.00]World");
        let srt = std::fs::read_to_string(out.path().join("Test Artist - Song.srt")).unwrap();
        assert!(srt.starts_with("1\n00:00:12,500 --> 00:00:15,000\nHello"));

        let report = metadata::inspect(&outcome.path).unwrap();
        assert_eq!(report.title.as_deref(), Some("Song"));

        let stats = downloader.stats();
        assert_eq!(stats.successful_downloads, 1);
        assert_eq!(stats.metadata_embedded, 1);
        assert!(downloader.failures().is_empty());
    }

    #[tokio::test]
    async fn test_plain_lyrics_sidecar_is_txt() {
        let server = MockServer::start().await;
        let out = tempdir().unwrap();
        mount_track(&server, 8).await;
        mount_lyrics(&server, "No timing here").await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"stream": format!("{}/cdn/8.flac", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/8.flac"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(minimal_flac()))
            .mount(&server)
            .await;

        let mut config = test_config_in(&server.uri(), out.path());
        config.download.save_lyrics = true;
        config.download.save_subtitles = true;
        let downloader = Downloader::new(Arc::new(config)).unwrap();

        downloader.download_track(8, out.path(), Some(4)).await.unwrap();

        let txt = out.path().join("04. Test Artist - Song.txt");
        assert_eq!(std::fs::read_to_string(txt).unwrap(), "No timing here");
        assert!(!out.path().join("04. Test Artist - Song.srt").exists());
    }

    #[tokio::test]
    async fn test_unverified_fallback_uses_stream_lookup() {
        let server = MockServer::start().await;
        let out = tempdir().unwrap();
        mount_track(&server, 116136641).await;
        mount_lyrics(&server, "").await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .and(query_param("quality", "flac"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .and(query_param("quality", "high"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"stream": format!("{}/cdn/high.mp3", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/high.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let mut config = test_config_in(&server.uri(), out.path());
        config.download.embed_metadata = false;
        let downloader = Downloader::new(Arc::new(config)).unwrap();

        let outcome = downloader
            .download_track(116136641, out.path(), None)
            .await
            .unwrap();
        assert_eq!(outcome.tier, Tier::High);
        assert_eq!(outcome.bytes, 64);
        assert!(outcome.path.to_str().unwrap().ends_with(".mp3"));
    }

    #[tokio::test]
    async fn test_verified_without_fallback_is_recorded() {
        let server = MockServer::start().await;
        let out = tempdir().unwrap();
        mount_track(&server, 116136641).await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .and(query_param("quality", "flac"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .and(query_param("quality", "high"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"stream": format!("{}/cdn/high.mp3", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .and(query_param("quality", "mid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;

        let mut config = test_config_in(&server.uri(), out.path());
        config.download.verify_quality = true;
        config.download.fallback_to_lower_quality = false;
        let downloader = Downloader::new(Arc::new(config)).unwrap();

        assert!(downloader.download_track(116136641, out.path(), None).await.is_none());

        let failures = downloader.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, 116136641);
        assert_eq!(failures[0].kind, FailureKind::QualityUnavailable);
        assert_eq!(downloader.stats().failed_downloads, 1);
        assert!(std::fs::read_dir(out.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_tag_failure_keeps_download() {
        let server = MockServer::start().await;
        let out = tempdir().unwrap();
        mount_track(&server, 9).await;
        mount_lyrics(&server, "").await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"stream": format!("{}/cdn/9.flac", server.uri())}
            })))
            .mount(&server)
            .await;
        // Not a FLAC stream
        Mock::given(method("GET"))
            .and(path("/cdn/9.flac"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not audio".to_vec()))
            .mount(&server)
            .await;

        let config = test_config_in(&server.uri(), out.path());
        let downloader = Downloader::new(Arc::new(config)).unwrap();

        let outcome = downloader.download_track(9, out.path(), None).await.unwrap();
        assert!(!outcome.tagged);
        assert!(outcome.path.exists());

        let stats = downloader.stats();
        assert_eq!(stats.successful_downloads, 1);
        assert_eq!(stats.metadata_embedded, 0);
        let failures = downloader.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::TagWrite);
    }

    #[tokio::test]
    async fn test_dead_tag_writer_is_recorded() {
        let out = tempdir().unwrap();
        let config = test_config_in("http://127.0.0.1:1", out.path());
        let downloader = Downloader::new(Arc::new(config)).unwrap();

        let joined = tokio::task::spawn_blocking(|| -> std::result::Result<(), MetadataError> {
            panic!("writer crashed")
        })
        .await;
        assert!(joined.is_err());

        let audio = out.path().join("11.flac");
        assert!(!downloader.settle_embed(11, &audio, joined));

        let failures = downloader.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, 11);
        assert_eq!(failures[0].kind, FailureKind::TagWrite);
        assert!(failures[0].message.contains("Tag writer aborted"));
        assert_eq!(downloader.stats().metadata_embedded, 0);
    }

    #[tokio::test]
    async fn test_streaminfo_only_download_is_tagged() {
        let server = MockServer::start().await;
        let out = tempdir().unwrap();
        mount_track(&server, 12).await;
        mount_lyrics(&server, "").await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"stream": format!("{}/cdn/12.flac", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/12.flac"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bare_flac()))
            .mount(&server)
            .await;

        let config = test_config_in(&server.uri(), out.path());
        let downloader = Downloader::new(Arc::new(config)).unwrap();

        let outcome = downloader.download_track(12, out.path(), None).await.unwrap();
        assert!(outcome.tagged);
        assert!(downloader.failures().is_empty());
        let report = metadata::inspect(&outcome.path).unwrap();
        assert_eq!(report.title.as_deref(), Some("Song"));
    }
}

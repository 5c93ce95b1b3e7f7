//! Per-track availability probing.
//!
//! Evidence comes from the track detail first (`has_flac`,
//! `highest_quality`, the `files` list). Any tier the detail does not
//! vouch for is checked with a stream-location lookup, so every tier the
//! probe marks available was confirmed by the service during this run.

use std::sync::Arc;

use super::{FileEvidence, QualityProbe, Tier};
use crate::model::TrackRecord;
use crate::service::{ServiceClient, ServiceError};

/// Lowest MP3 bitrate still counted as the `high` tier.
const HIGH_MIN_BITRATE: u32 = 256_000;

pub struct QualityResolver {
    client: Arc<ServiceClient>,
}

impl QualityResolver {
    pub fn new(client: Arc<ServiceClient>) -> Self {
        Self { client }
    }

    /// Fetch the track fresh and probe every tier.
    pub async fn probe(&self, track_id: u64) -> Result<QualityProbe, ServiceError> {
        let track = self.client.track(track_id).await?;
        Ok(self.probe_record(&track).await)
    }

    /// Probe using a track detail fetched earlier in the same run.
    pub async fn probe_record(&self, track: &TrackRecord) -> QualityProbe {
        let mut probe = evidence_from_detail(track);

        for tier in Tier::ORDER {
            if probe.is_available(tier) {
                continue;
            }
            match self.client.stream_url(track.id, tier).await {
                Ok(_) => {
                    tracing::debug!(track_id = track.id, quality = %tier, "Tier confirmed by stream lookup");
                    probe.confirm(tier, None);
                }
                Err(ServiceError::NotFound { .. }) => {
                    tracing::debug!(track_id = track.id, quality = %tier, "Tier not offered");
                }
                Err(e) => {
                    tracing::warn!(track_id = track.id, quality = %tier, error = %e, "Tier lookup failed, treating as unavailable");
                }
            }
        }

        tracing::info!(
            track_id = track.id,
            available = ?probe.available_tiers(),
            "Quality probe complete"
        );
        probe
    }
}

/// Availability claimed by the track detail alone.
pub(crate) fn evidence_from_detail(track: &TrackRecord) -> QualityProbe {
    let mut probe = QualityProbe::new(track.id);

    for file in &track.files {
        if let Some(tier) = tier_of_file(file) {
            probe.confirm(tier, Some(file.clone()));
        }
    }

    if track.has_lossless || track.highest_quality.as_deref() == Some("flac") {
        probe.confirm(Tier::Lossless, None);
    }
    if track.highest_quality.as_deref() == Some("high") {
        probe.confirm(Tier::High, None);
    }

    probe
}

fn tier_of_file(file: &FileEvidence) -> Option<Tier> {
    match file.codec.as_str() {
        "flac" => Some(Tier::Lossless),
        "mp3" => match file.bitrate {
            Some(bps) if bps >= HIGH_MIN_BITRATE => Some(Tier::High),
            Some(_) => Some(Tier::Mid),
            None => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::recommend;
    use crate::stats::DownloadStats;
    use crate::test_utils::{test_config, track_json};
    use crate::transport::Transport;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver_for(server: &MockServer) -> QualityResolver {
        let config = test_config(&server.uri());
        let transport = Transport::new(&config, Arc::new(DownloadStats::default())).unwrap();
        let client = ServiceClient::new(Arc::new(transport), &config);
        QualityResolver::new(Arc::new(client))
    }

    fn mp3(bitrate: u32) -> FileEvidence {
        FileEvidence {
            codec: "mp3".to_string(),
            bitrate: Some(bitrate),
        }
    }

    #[test]
    fn test_detail_evidence() {
        let track = TrackRecord {
            id: 1,
            has_lossless: true,
            files: vec![mp3(320_000), mp3(128_000)],
            ..Default::default()
        };
        let probe = evidence_from_detail(&track);
        assert_eq!(
            probe.available_tiers(),
            vec![Tier::Lossless, Tier::High, Tier::Mid]
        );
        assert_eq!(probe.evidence(Tier::Mid).unwrap().bitrate, Some(128_000));
    }

    #[test]
    fn test_unknown_codec_ignored() {
        let track = TrackRecord {
            id: 1,
            files: vec![FileEvidence {
                codec: "aac".to_string(),
                bitrate: Some(256_000),
            }],
            ..Default::default()
        };
        assert!(evidence_from_detail(&track).is_empty());
    }

    #[tokio::test]
    async fn test_full_evidence_needs_no_stream_lookups() {
        let server = MockServer::start().await;
        let mut detail = track_json(2, "Song", 1);
        detail["has_flac"] = json!(true);
        detail["files"] = json!([
            {"codec": "flac", "bitrate": 900000},
            {"codec": "mp3", "bitrate": 320000},
            {"codec": "mp3", "bitrate": 128000}
        ]);
        Mock::given(method("GET"))
            .and(path("/api/tiny/tracks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": {"tracks": {"2": detail}}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .expect(0)
            .mount(&server)
            .await;

        let probe = resolver_for(&server).probe(2).await.unwrap();
        assert_eq!(probe.available_tiers().len(), 3);
    }

    #[tokio::test]
    async fn test_flac_missing_falls_back_to_high() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"tracks": {"116136641": track_json(116136641, "Song", 1)}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .and(query_param("quality", "flac"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .and(query_param("quality", "high"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"result": {"stream": "https://cdn.example/high.mp3"}}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tiny/track/stream"))
            .and(query_param("quality", "mid"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let probe = resolver_for(&server).probe(116136641).await.unwrap();
        assert!(!probe.is_available(Tier::Lossless));
        assert!(probe.is_available(Tier::High));
        assert!(!probe.is_available(Tier::Mid));
        assert_eq!(recommend(&probe, Tier::Lossless), Some(Tier::High));
    }
}

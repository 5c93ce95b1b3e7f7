//! Zvuk HTTP client
//!
//! Typed calls over the shared [`Transport`]. All requests inherit the
//! transport's admission gate, politeness delay and retry policy.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{ServiceError, adapter, dto};
use crate::config::Config;
use crate::model::{PlaylistRecord, ReleaseRecord, TrackRecord};
use crate::quality::Tier;
use crate::transport::{ApiRequest, Transport};

const TRACKS: &str = "/api/tiny/tracks";
const RELEASES: &str = "/api/tiny/releases";
const PLAYLISTS: &str = "/api/tiny/playlists";
const STREAM: &str = "/api/tiny/track/stream";
const LYRICS: &str = "/api/tiny/lyrics";
const GRAPHQL: &str = "/api/v1/graphql";

/// Service maximum for one artist-releases page.
const PAGE_SIZE: usize = 50;

/// Release ids per metadata request.
const RELEASE_CHUNK: usize = 50;

/// A release together with its constituent track details.
#[derive(Debug, Clone)]
pub struct ReleaseBundle {
    pub release: ReleaseRecord,
    pub tracks: HashMap<u64, TrackRecord>,
}

/// A playlist together with its track details.
#[derive(Debug, Clone)]
pub struct PlaylistBundle {
    pub playlist: PlaylistRecord,
    pub tracks: HashMap<u64, TrackRecord>,
}

/// Zvuk API client
pub struct ServiceClient {
    transport: Arc<Transport>,
    page_delay: Duration,
}

impl ServiceClient {
    pub fn new(transport: Arc<Transport>, config: &Config) -> Self {
        Self {
            transport,
            page_delay: config.network.page_delay(),
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Fetch one track's detail. Always goes to the service.
    pub async fn track(&self, id: u64) -> Result<TrackRecord, ServiceError> {
        tracing::debug!(track_id = id, "Fetching track info");
        let value = self
            .transport
            .get_json(
                ApiRequest::get(TRACKS)
                    .param("ids", id)
                    .param("include", "track"),
            )
            .await?;

        let mut result = decode::<dto::TracksResult>(TRACKS, value)?
            .ok_or_else(|| ServiceError::not_found("track", id))?;
        let track = result
            .tracks
            .remove(&id.to_string())
            .ok_or_else(|| ServiceError::not_found("track", id))?;

        Ok(adapter::to_track(track))
    }

    /// Fetch a release and its tracks in one call.
    pub async fn release(&self, id: u64) -> Result<ReleaseBundle, ServiceError> {
        tracing::debug!(release_id = id, "Fetching release");
        let value = self
            .transport
            .get_json(
                ApiRequest::get(RELEASES)
                    .param("ids", id)
                    .param("include", "track"),
            )
            .await?;

        let mut result = decode::<dto::ReleasesResult>(RELEASES, value)?
            .ok_or_else(|| ServiceError::not_found("release", id))?;
        let release = result
            .releases
            .remove(&id.to_string())
            .ok_or_else(|| ServiceError::not_found("release", id))?;

        Ok(ReleaseBundle {
            release: adapter::to_release(release),
            tracks: adapter::to_track_map(result.tracks),
        })
    }

    /// Fetch release metadata (without tracks) for many ids.
    ///
    /// The result follows the order of `ids`; ids the service does not know
    /// are skipped.
    pub async fn releases(&self, ids: &[u64]) -> Result<Vec<ReleaseRecord>, ServiceError> {
        let mut found: HashMap<u64, ReleaseRecord> = HashMap::new();

        for chunk in ids.chunks(RELEASE_CHUNK) {
            let joined = chunk
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let value = self
                .transport
                .get_json(ApiRequest::get(RELEASES).param("ids", joined))
                .await?;

            match decode::<dto::ReleasesResult>(RELEASES, value)? {
                Some(result) => {
                    for release in result.releases.into_values() {
                        found.insert(release.id, adapter::to_release(release));
                    }
                }
                None => tracing::warn!(count = chunk.len(), "Release chunk returned no result"),
            }
        }

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    /// Fetch a playlist and its tracks in one call.
    pub async fn playlist(&self, id: u64) -> Result<PlaylistBundle, ServiceError> {
        tracing::debug!(playlist_id = id, "Fetching playlist");
        let value = self
            .transport
            .get_json(
                ApiRequest::get(PLAYLISTS)
                    .param("ids", id)
                    .param("include", "track"),
            )
            .await?;

        let mut result = decode::<dto::PlaylistsResult>(PLAYLISTS, value)?
            .ok_or_else(|| ServiceError::not_found("playlist", id))?;
        let playlist = result
            .playlists
            .remove(&id.to_string())
            .ok_or_else(|| ServiceError::not_found("playlist", id))?;

        Ok(PlaylistBundle {
            playlist: adapter::to_playlist(playlist),
            tracks: adapter::to_track_map(result.tracks),
        })
    }

    /// Resolve the fetchable location of a track's audio at `tier`.
    pub async fn stream_url(&self, id: u64, tier: Tier) -> Result<String, ServiceError> {
        tracing::debug!(track_id = id, quality = tier.api_name(), "Resolving stream location");
        let value = self
            .transport
            .get_json(
                ApiRequest::get(STREAM)
                    .param("id", id)
                    .param("quality", tier.api_name()),
            )
            .await?;

        decode::<dto::StreamResult>(STREAM, value)?
            .and_then(|r| r.stream)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::not_found("stream", id))
    }

    /// Raw lyrics text, `None` when the track has none.
    pub async fn lyrics(&self, id: u64) -> Result<Option<String>, ServiceError> {
        let value = self
            .transport
            .get_json(ApiRequest::get(LYRICS).param("track_id", id))
            .await?;

        Ok(decode::<dto::LyricsResult>(LYRICS, value)?
            .and_then(|r| r.lyrics)
            .filter(|l| !l.trim().is_empty()))
    }

    /// Page through an artist's release ids.
    ///
    /// `limit == 0` collects everything. A page with zero releases ends the
    /// listing. A failed page is requested once more; a second failure ends
    /// the listing with what was collected so far (or the error, if nothing
    /// was).
    pub async fn artist_release_ids(
        &self,
        artist_id: u64,
        limit: usize,
    ) -> Result<Vec<u64>, ServiceError> {
        let page_size = if limit == 0 {
            PAGE_SIZE
        } else {
            limit.min(PAGE_SIZE)
        };
        let mut collected = Vec::new();
        let mut offset = 0;

        loop {
            let page = match self.artist_page(artist_id, page_size, offset).await {
                Ok(page) => page,
                Err(first) => {
                    tracing::warn!(artist_id, offset, error = %first, "Release page failed, retrying once");
                    match self.artist_page(artist_id, page_size, offset).await {
                        Ok(page) => page,
                        Err(e) if collected.is_empty() => return Err(e),
                        Err(e) => {
                            tracing::warn!(artist_id, offset, error = %e, "Release page failed twice, stopping");
                            break;
                        }
                    }
                }
            };

            let (ids, page_len) = page;
            if page_len == 0 {
                break;
            }
            collected.extend(ids);

            if limit > 0 && collected.len() >= limit {
                collected.truncate(limit);
                break;
            }

            offset += page_len;
            tokio::time::sleep(self.page_delay).await;
        }

        tracing::info!(artist_id, count = collected.len(), "Collected artist releases");
        Ok(collected)
    }

    /// One GraphQL page: release ids plus the raw number of entries.
    async fn artist_page(
        &self,
        artist_id: u64,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<u64>, usize), ServiceError> {
        let body = json!({
            "query": dto::ARTIST_RELEASES_QUERY,
            "variables": {
                "id": artist_id.to_string(),
                "limit": limit,
                "offset": offset,
            }
        });
        let value = self
            .transport
            .get_json(ApiRequest::post(GRAPHQL, &body))
            .await?;

        let response: dto::GraphqlResponse<dto::ArtistsData> = serde_json::from_value(value)
            .map_err(|e| ServiceError::Malformed {
                endpoint: GRAPHQL,
                reason: e.to_string(),
            })?;

        let artist = response
            .data
            .and_then(|d| d.get_artists.into_iter().next())
            .ok_or_else(|| ServiceError::Malformed {
                endpoint: GRAPHQL,
                reason: "missing data.getArtists".to_string(),
            })?;

        let page_len = artist.releases.len();
        let ids = artist
            .releases
            .iter()
            .filter_map(|r| r.id.as_ref().and_then(dto::Scalar::as_u64))
            .collect();
        Ok((ids, page_len))
    }
}

/// Unwrap the `result` envelope.
fn decode<T: DeserializeOwned>(
    endpoint: &'static str,
    value: Value,
) -> Result<Option<T>, ServiceError> {
    serde_json::from_value::<dto::Envelope<T>>(value)
        .map(|envelope| envelope.result)
        .map_err(|e| ServiceError::Malformed {
            endpoint,
            reason: e.to_string(),
        })
}

//! Artist flow: list releases, pick the newest, download them one by one.

use std::cmp::Reverse;

use super::{Downloader, UnitKind};
use crate::model::ReleaseRecord;

/// Release ids listed per requested release, so that filtering out singles
/// still leaves enough candidates.
const OVERFETCH_FACTOR: usize = 2;

/// Totals for an artist run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtistOutcome {
    pub releases_selected: usize,
    /// Releases with at least one track written
    pub releases_succeeded: usize,
    pub tracks_succeeded: usize,
    pub tracks_total: usize,
}

/// Choose which releases to download.
///
/// Optionally keeps album-like releases only, orders newest first with
/// unknown dates last (ties keep listing order), then keeps at most `limit`
/// (`0` keeps all).
pub fn select_releases(
    mut releases: Vec<ReleaseRecord>,
    limit: usize,
    skip_singles: bool,
) -> Vec<ReleaseRecord> {
    if skip_singles {
        releases.retain(ReleaseRecord::is_album_like);
    }
    // Option orders None first, so reversing puts unknown dates last
    releases.sort_by_key(|r| Reverse(r.date_key()));
    if limit > 0 {
        releases.truncate(limit);
    }
    releases
}

impl Downloader {
    /// Download up to `limit` of an artist's newest releases (`0` = all).
    pub async fn download_artist(
        &self,
        artist_id: u64,
        limit: usize,
        skip_singles: bool,
    ) -> ArtistOutcome {
        let fetch = limit.saturating_mul(OVERFETCH_FACTOR);
        let ids = match self.client.artist_release_ids(artist_id, fetch).await {
            Ok(ids) => ids,
            Err(e) => {
                self.record_failure(UnitKind::Artist, artist_id, &e.into());
                return ArtistOutcome::default();
            }
        };
        if ids.is_empty() {
            tracing::warn!(artist_id, "Artist has no releases");
            return ArtistOutcome::default();
        }

        let releases = match self.client.releases(&ids).await {
            Ok(releases) => releases,
            Err(e) => {
                self.record_failure(UnitKind::Artist, artist_id, &e.into());
                return ArtistOutcome::default();
            }
        };

        let selected = select_releases(releases, limit, skip_singles);
        tracing::info!(
            artist_id,
            listed = ids.len(),
            selected = selected.len(),
            skip_singles,
            "Releases selected"
        );

        let mut outcome = ArtistOutcome {
            releases_selected: selected.len(),
            ..Default::default()
        };

        for (i, release) in selected.iter().enumerate() {
            tracing::info!(
                artist_id,
                index = i + 1,
                of = selected.len(),
                release_id = release.id,
                title = %release.title,
                "Starting release"
            );
            let batch = self.download_release(release.id, Some(i + 1)).await;
            if batch.is_success() {
                outcome.releases_succeeded += 1;
            }
            outcome.tracks_succeeded += batch.succeeded;
            outcome.tracks_total += batch.total;
        }

        outcome
    }
}

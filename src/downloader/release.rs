//! Release and playlist flows.
//!
//! Both fetch their record and track details in one call, create the target
//! directory once, then download every track concurrently. Sibling failures
//! never cancel each other; the result is the number of tracks written.

use futures::future::join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{Downloader, UnitKind};
use crate::error::Error;
use crate::model::TrackRecord;
use crate::organizer::{ensure_dir, playlist_dir_name, release_dir_name};

/// Result of a multi-track download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Tracks whose audio was written
    pub succeeded: usize,
    /// Tracks the release or playlist lists
    pub total: usize,
    /// Target directory, when it was created
    pub dir: Option<PathBuf>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }
}

impl Downloader {
    /// Download a whole release. `index` is the release's 1-based position
    /// in an artist run and prefixes the directory name.
    pub async fn download_release(&self, release_id: u64, index: Option<usize>) -> BatchOutcome {
        let bundle = match self.client.release(release_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                self.record_failure(UnitKind::Release, release_id, &e.into());
                return BatchOutcome::default();
            }
        };
        let release = bundle.release;

        let root = &self.config.download.output_dir;
        let dir = match ensure_dir(root, &release_dir_name(&release, index)) {
            Ok(dir) => dir,
            Err(e) => {
                self.record_failure(UnitKind::Release, release_id, &Error::io(root, e));
                return BatchOutcome::default();
            }
        };

        tracing::info!(
            release_id,
            title = %release.title,
            tracks = release.track_ids.len(),
            dir = %dir.display(),
            "Downloading release"
        );

        // Service position when known, list order otherwise
        let jobs = release
            .track_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                let position = bundle
                    .tracks
                    .get(&id)
                    .map(|t| t.position)
                    .filter(|&p| p > 0)
                    .unwrap_or(i as u32 + 1);
                (id, position)
            })
            .collect();

        let succeeded = self.fan_out(jobs, bundle.tracks, &dir).await;
        tracing::info!(
            release_id,
            succeeded,
            total = release.track_ids.len(),
            "Release finished"
        );

        BatchOutcome {
            succeeded,
            total: release.track_ids.len(),
            dir: Some(dir),
        }
    }

    /// Download a playlist into a directory named after it. Files are
    /// prefixed with their playlist order.
    pub async fn download_playlist(&self, playlist_id: u64) -> BatchOutcome {
        let bundle = match self.client.playlist(playlist_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                self.record_failure(UnitKind::Playlist, playlist_id, &e.into());
                return BatchOutcome::default();
            }
        };
        let playlist = bundle.playlist;

        let root = &self.config.download.output_dir;
        let dir = match ensure_dir(root, &playlist_dir_name(&playlist)) {
            Ok(dir) => dir,
            Err(e) => {
                self.record_failure(UnitKind::Playlist, playlist_id, &Error::io(root, e));
                return BatchOutcome::default();
            }
        };

        tracing::info!(
            playlist_id,
            title = %playlist.title,
            tracks = playlist.track_ids.len(),
            "Downloading playlist"
        );

        let jobs = playlist
            .track_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i as u32 + 1))
            .collect();
        let succeeded = self.fan_out(jobs, bundle.tracks, &dir).await;

        BatchOutcome {
            succeeded,
            total: playlist.track_ids.len(),
            dir: Some(dir),
        }
    }

    /// Run every `(track id, position)` concurrently and count successes.
    ///
    /// Tracks missing from `known` are fetched individually.
    async fn fan_out(
        &self,
        jobs: Vec<(u64, u32)>,
        mut known: HashMap<u64, TrackRecord>,
        dir: &Path,
    ) -> usize {
        let downloads = jobs.into_iter().map(|(id, position)| {
            let record = known.remove(&id);
            self.run_track(id, record, dir, Some(position))
        });

        join_all(downloads)
            .await
            .into_iter()
            .filter(Option::is_some)
            .count()
    }
}

//! Acquisition orchestrator - drives track, release, playlist and artist downloads
//!
//! Every unit of work is isolated: an error becomes a [`FailureRecord`] and
//! processing continues with the next unit. Nothing in here returns an error
//! for a single failed item.
//!
//! - `track.rs`: single-track state machine
//! - `release.rs`: release and playlist fan-out
//! - `artist.rs`: release selection and the sequential artist run

mod artist;
mod release;
mod track;

pub use artist::{ArtistOutcome, select_releases};
pub use release::BatchOutcome;
pub use track::TrackOutcome;

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, FailureKind};
use crate::quality::QualityResolver;
use crate::service::ServiceClient;
use crate::stats::{DownloadStats, StatsSnapshot};
use crate::transport::{Transport, TransportError};

/// What a failure record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Track,
    Release,
    Playlist,
    Artist,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnitKind::Track => "track",
            UnitKind::Release => "release",
            UnitKind::Playlist => "playlist",
            UnitKind::Artist => "artist",
        })
    }
}

/// One failed item, kept until the end of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub unit: UnitKind,
    pub id: u64,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]: {}", self.unit, self.id, self.kind, self.message)
    }
}

/// Shared state for one run.
pub struct Downloader {
    config: Arc<Config>,
    client: Arc<ServiceClient>,
    resolver: QualityResolver,
    stats: Arc<DownloadStats>,
    failures: Mutex<Vec<FailureRecord>>,
}

impl Downloader {
    /// Build the transport, client and resolver for `config`.
    pub fn new(config: Arc<Config>) -> Result<Self, TransportError> {
        let stats = Arc::new(DownloadStats::default());
        let transport = Arc::new(Transport::new(&config, Arc::clone(&stats))?);
        let client = Arc::new(ServiceClient::new(transport, &config));
        Ok(Self::with_client(config, client))
    }

    /// Use an existing client; statistics are shared with its transport.
    pub fn with_client(config: Arc<Config>, client: Arc<ServiceClient>) -> Self {
        let stats = Arc::clone(client.transport().stats());
        Self {
            resolver: QualityResolver::new(Arc::clone(&client)),
            config,
            client,
            stats,
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Arc<ServiceClient> {
        &self.client
    }

    pub fn resolver(&self) -> &QualityResolver {
        &self.resolver
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Failures recorded so far, in the order they happened.
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures.lock().clone()
    }

    fn record_failure(&self, unit: UnitKind, id: u64, error: &Error) {
        let record = FailureRecord {
            unit,
            id,
            kind: error.kind(),
            message: error.to_string(),
        };
        tracing::error!(%unit, id, kind = %record.kind, error = %error, "Failed");
        self.failures.lock().push(record);
    }
}

//! Zvuk API Data Transfer Objects
//!
//! These types match what the `tiny` REST endpoints and the GraphQL endpoint
//! return. DO NOT use them outside the service module - convert to
//! `crate::model` types in `adapter.rs`.
//!
//! Every REST response is wrapped in `{"result": {...}}`; collections are
//! maps keyed by the id as a string.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `{"result": ...}` wrapper. A missing `result` is the not-found condition.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub result: Option<T>,
}

/// A value the service sends either as a JSON number or as a string
/// (ids in GraphQL, dates in REST).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(u64),
    Text(String),
}

impl Scalar {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

/// `/api/tiny/tracks` result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TracksResult {
    #[serde(default)]
    pub tracks: HashMap<String, TrackDto>,
}

/// `/api/tiny/releases` result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleasesResult {
    #[serde(default)]
    pub releases: HashMap<String, ReleaseDto>,
    /// Present when requested with `include=track`
    #[serde(default)]
    pub tracks: HashMap<String, TrackDto>,
}

/// `/api/tiny/playlists` result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistsResult {
    #[serde(default)]
    pub playlists: HashMap<String, PlaylistDto>,
    #[serde(default)]
    pub tracks: HashMap<String, TrackDto>,
}

/// `/api/tiny/track/stream` result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamResult {
    pub stream: Option<String>,
}

/// `/api/tiny/lyrics` result
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LyricsResult {
    pub lyrics: Option<String>,
}

/// Track detail
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackDto {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist_names: Vec<String>,
    #[serde(default)]
    pub release_title: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
    /// Usually an ISO date string, occasionally a `YYYYMMDD` number
    #[serde(default)]
    pub release_date: Option<Scalar>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub has_flac: bool,
    #[serde(default)]
    pub highest_quality: Option<String>,
    #[serde(default)]
    pub image: Option<ImageDto>,
    #[serde(default)]
    pub files: Vec<FileDto>,
    #[serde(default)]
    pub genres: Vec<GenreDto>,
    #[serde(default)]
    pub explicit: bool,
    /// Lyrics availability flag
    #[serde(default)]
    pub lyrics: Option<bool>,
}

/// Image reference. `src` contains a `{size}` placeholder.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageDto {
    pub src: Option<String>,
}

/// One encoding listed for a track
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileDto {
    /// Bits per second
    #[serde(default)]
    pub bitrate: Option<u32>,
    #[serde(default)]
    pub codec: Option<String>,
}

/// Genres arrive either as plain names or as objects
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GenreDto {
    Name(String),
    Object { name: String },
}

/// Release detail
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseDto {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    /// `album`, `single`, `compilation`, ...
    #[serde(rename = "type", default)]
    pub release_type: Option<String>,
    #[serde(default)]
    pub track_ids: Vec<u64>,
    /// `YYYYMMDD` as a number or string
    #[serde(default)]
    pub date: Option<Scalar>,
    #[serde(default)]
    pub artist_names: Vec<String>,
}

/// Playlist detail
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistDto {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub track_ids: Vec<u64>,
}

// ============================================================================
// GraphQL
// ============================================================================

/// Artist release listing query
pub const ARTIST_RELEASES_QUERY: &str = "query getArtistReleases($id: ID!, $limit: Int!, $offset: Int!) { getArtists(ids: [$id]) { releases(limit: $limit, offset: $offset) { id } } }";

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistsData {
    #[serde(rename = "getArtists", default)]
    pub get_artists: Vec<ArtistReleasesDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistReleasesDto {
    #[serde(default)]
    pub releases: Vec<ReleaseRefDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseRefDto {
    pub id: Option<Scalar>,
}

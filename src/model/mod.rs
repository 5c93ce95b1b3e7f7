//! Core records for tracks, releases and playlists.
//!
//! These are OUR types. Wire shapes live in `service::dto` and are converted
//! by `service::adapter`, so a change in the service's JSON only touches
//! those two files.
//!
//! Records are immutable once fetched; one instance per remote id per run.

use crate::quality::FileEvidence;

/// Tracks on a release at which it counts as a full album even when the
/// service does not type it as one.
pub const ALBUM_LIKE_MIN_TRACKS: usize = 7;

/// A single track as reported by the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRecord {
    pub id: u64,
    pub title: String,
    /// Credited artists, in service order
    pub artists: Vec<String>,
    /// Album title, if the track belongs to one
    pub album: Option<String>,
    /// 1-based position on its release; 0 when unknown
    pub position: u32,
    /// Four-digit release year
    pub year: Option<String>,
    pub duration_secs: u32,
    /// Service claims a lossless encoding exists
    pub has_lossless: bool,
    /// Service's own notion of the best encoding (e.g. `flac`, `high`)
    pub highest_quality: Option<String>,
    /// Encodings listed in the track detail
    pub files: Vec<FileEvidence>,
    /// Cover URL template containing a `{size}` placeholder
    pub cover_template: Option<String>,
    pub genres: Vec<String>,
    pub explicit: bool,
    /// Service reports lyrics for this track
    pub has_lyrics: bool,
}

impl TrackRecord {
    /// First credited artist, used in file names.
    pub fn primary_artist(&self) -> &str {
        self.artists
            .first()
            .map(String::as_str)
            .unwrap_or("Unknown")
    }

    /// All credited artists joined for display.
    pub fn artist_line(&self) -> String {
        if self.artists.is_empty() {
            "Unknown".to_string()
        } else {
            self.artists.join(", ")
        }
    }
}

/// Release classification used for folder labels and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    Album,
    Ep,
    Single,
    Unknown,
}

impl ReleaseKind {
    /// Infer the kind from track count alone.
    pub fn from_track_count(count: usize) -> Self {
        match count {
            0 => ReleaseKind::Unknown,
            1 => ReleaseKind::Single,
            2..=6 => ReleaseKind::Ep,
            _ => ReleaseKind::Album,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseKind::Album => "album",
            ReleaseKind::Ep => "ep",
            ReleaseKind::Single => "single",
            ReleaseKind::Unknown => "unknown",
        }
    }
}

/// An album, EP or single. Owns only track ids; details are joined by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseRecord {
    pub id: u64,
    pub title: String,
    /// Type string as sent by the service (`album`, `single`, ...)
    pub release_type: Option<String>,
    /// Constituent tracks in release order
    pub track_ids: Vec<u64>,
    /// Release date as digits, normally `YYYYMMDD`
    pub date: Option<String>,
    pub artists: Vec<String>,
}

impl ReleaseRecord {
    /// Service type when known, otherwise inferred from the track count.
    pub fn kind(&self) -> ReleaseKind {
        match self.release_type.as_deref() {
            Some("album") => ReleaseKind::Album,
            Some("single") => ReleaseKind::Single,
            Some("ep") => ReleaseKind::Ep,
            _ => ReleaseKind::from_track_count(self.track_ids.len()),
        }
    }

    /// Typed as album by the service, or long enough to count as one.
    pub fn is_album_like(&self) -> bool {
        self.release_type.as_deref() == Some("album")
            || self.track_ids.len() >= ALBUM_LIKE_MIN_TRACKS
    }

    /// Folder label: `LP` for albums, otherwise by track count.
    pub fn label(&self) -> Option<&'static str> {
        if self.release_type.as_deref() == Some("album") {
            return Some("LP");
        }
        match self.track_ids.len() {
            1 => Some("SINGLE"),
            2..=6 => Some("EP"),
            _ => None,
        }
    }

    /// Four-digit year from the date, when it starts with one.
    pub fn year(&self) -> Option<&str> {
        let date = self.date.as_deref()?;
        let year = date.get(..4)?;
        year.bytes().all(|b| b.is_ascii_digit()).then_some(year)
    }

    /// Sortable date key (first eight digits), `None` when unknown.
    pub fn date_key(&self) -> Option<u64> {
        let digits: String = self
            .date
            .as_deref()?
            .chars()
            .filter(char::is_ascii_digit)
            .take(8)
            .collect();
        digits.parse().ok()
    }
}

/// A user or editorial playlist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistRecord {
    pub id: u64,
    pub title: String,
    /// Tracks in playlist order
    pub track_ids: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(kind: Option<&str>, tracks: usize, date: Option<&str>) -> ReleaseRecord {
        ReleaseRecord {
            id: 1,
            title: "Release".to_string(),
            release_type: kind.map(str::to_string),
            track_ids: (1..=tracks as u64).collect(),
            date: date.map(str::to_string),
            artists: vec![],
        }
    }

    #[test]
    fn test_kind_inferred_from_track_count() {
        assert_eq!(release(None, 1, None).kind(), ReleaseKind::Single);
        assert_eq!(release(None, 2, None).kind(), ReleaseKind::Ep);
        assert_eq!(release(None, 6, None).kind(), ReleaseKind::Ep);
        assert_eq!(release(None, 7, None).kind(), ReleaseKind::Album);
        assert_eq!(release(None, 0, None).kind(), ReleaseKind::Unknown);
        assert_eq!(release(Some("album"), 1, None).kind(), ReleaseKind::Album);
    }

    #[test]
    fn test_album_like() {
        assert!(release(Some("album"), 3, None).is_album_like());
        assert!(release(Some("single"), 7, None).is_album_like());
        assert!(!release(Some("single"), 6, None).is_album_like());
        assert!(!release(None, 1, None).is_album_like());
    }

    #[test]
    fn test_labels() {
        assert_eq!(release(Some("album"), 12, None).label(), Some("LP"));
        assert_eq!(release(Some("single"), 1, None).label(), Some("SINGLE"));
        assert_eq!(release(None, 4, None).label(), Some("EP"));
        assert_eq!(release(Some("compilation"), 20, None).label(), None);
    }

    #[test]
    fn test_year_and_date_key() {
        let r = release(None, 1, Some("20230415"));
        assert_eq!(r.year(), Some("2023"));
        assert_eq!(r.date_key(), Some(20230415));

        let r = release(None, 1, Some("2021-03-01"));
        assert_eq!(r.year(), Some("2021"));
        assert_eq!(r.date_key(), Some(20210301));

        let r = release(None, 1, Some("n/a"));
        assert_eq!(r.year(), None);
        assert_eq!(r.date_key(), None);
    }

    #[test]
    fn test_primary_artist_default() {
        let track = TrackRecord::default();
        assert_eq!(track.primary_artist(), "Unknown");

        let track = TrackRecord {
            artists: vec!["A".to_string(), "B".to_string()],
            ..Default::default()
        };
        assert_eq!(track.primary_artist(), "A");
        assert_eq!(track.artist_line(), "A, B");
    }
}

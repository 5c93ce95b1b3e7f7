//! Adapter layer: Convert Zvuk DTOs to core records
//!
//! This is the ONLY place where DTO types are converted to `crate::model`
//! types.

use std::collections::HashMap;

use super::dto;
use crate::model::{PlaylistRecord, ReleaseRecord, TrackRecord};
use crate::quality::FileEvidence;

pub fn to_track(track: dto::TrackDto) -> TrackRecord {
    TrackRecord {
        id: track.id,
        title: track.title.unwrap_or_else(|| "Unknown".to_string()),
        artists: track.artist_names,
        album: track.release_title.filter(|t| !t.is_empty()),
        position: track.position.unwrap_or(0),
        year: track.release_date.as_ref().and_then(year_of),
        duration_secs: track.duration.unwrap_or(0),
        has_lossless: track.has_flac,
        highest_quality: track.highest_quality,
        files: track.files.into_iter().filter_map(to_evidence).collect(),
        cover_template: track.image.and_then(|i| i.src).filter(|s| !s.is_empty()),
        genres: track
            .genres
            .into_iter()
            .map(|g| match g {
                dto::GenreDto::Name(name) | dto::GenreDto::Object { name } => name,
            })
            .collect(),
        explicit: track.explicit,
        has_lyrics: track.lyrics.unwrap_or(false),
    }
}

pub fn to_release(release: dto::ReleaseDto) -> ReleaseRecord {
    ReleaseRecord {
        id: release.id,
        title: release
            .title
            .unwrap_or_else(|| format!("Release_{}", release.id)),
        release_type: release.release_type.filter(|t| !t.is_empty()),
        track_ids: release.track_ids,
        date: release.date.map(|d| d.to_text()),
        artists: release.artist_names,
    }
}

pub fn to_playlist(playlist: dto::PlaylistDto) -> PlaylistRecord {
    PlaylistRecord {
        id: playlist.id,
        title: playlist
            .title
            .unwrap_or_else(|| format!("Playlist_{}", playlist.id)),
        track_ids: playlist.track_ids,
    }
}

/// Convert a string-keyed track map into records keyed by numeric id.
pub fn to_track_map(tracks: HashMap<String, dto::TrackDto>) -> HashMap<u64, TrackRecord> {
    tracks
        .into_values()
        .map(|t| (t.id, to_track(t)))
        .collect()
}

fn to_evidence(file: dto::FileDto) -> Option<FileEvidence> {
    let codec = file.codec?.to_ascii_lowercase();
    Some(FileEvidence {
        codec,
        bitrate: file.bitrate,
    })
}

/// First four characters of a date, when they are digits.
fn year_of(date: &dto::Scalar) -> Option<String> {
    let text = date.to_text();
    let year = text.get(..4)?;
    year.bytes()
        .all(|b| b.is_ascii_digit())
        .then(|| year.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_dto(json: &str) -> dto::TrackDto {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_to_track_full() {
        let track = to_track(track_dto(
            r#"{
                "id": 7, "title": "Song", "artist_names": ["A"],
                "release_title": "Album", "position": 2,
                "release_date": "2019-01-01", "duration": 200,
                "has_flac": true, "image": {"src": "https://x/{size}.jpg"},
                "files": [{"codec": "MP3", "bitrate": 128000}, {"bitrate": 1}],
                "genres": [{"name": "pop"}], "explicit": true, "lyrics": true
            }"#,
        ));

        assert_eq!(track.id, 7);
        assert_eq!(track.album.as_deref(), Some("Album"));
        assert_eq!(track.position, 2);
        assert_eq!(track.year.as_deref(), Some("2019"));
        assert!(track.has_lossless);
        assert_eq!(track.cover_template.as_deref(), Some("https://x/{size}.jpg"));
        // File without codec is dropped, codec is lowercased
        assert_eq!(track.files.len(), 1);
        assert_eq!(track.files[0].codec, "mp3");
        assert_eq!(track.genres, vec!["pop".to_string()]);
        assert!(track.explicit);
        assert!(track.has_lyrics);
    }

    #[test]
    fn test_to_track_defaults() {
        let track = to_track(track_dto(r#"{"id": 1, "release_title": ""}"#));
        assert_eq!(track.title, "Unknown");
        assert_eq!(track.album, None);
        assert_eq!(track.position, 0);
        assert_eq!(track.year, None);
        assert_eq!(track.cover_template, None);
    }

    #[test]
    fn test_numeric_release_date_gives_year() {
        let track = to_track(track_dto(r#"{"id": 1, "release_date": 20200101}"#));
        assert_eq!(track.year.as_deref(), Some("2020"));
    }

    #[test]
    fn test_to_release() {
        let dto: dto::ReleaseDto = serde_json::from_str(
            r#"{"id": 5, "type": "album", "track_ids": [1, 2], "date": 20230415}"#,
        )
        .unwrap();
        let release = to_release(dto);
        assert_eq!(release.title, "Release_5");
        assert_eq!(release.date.as_deref(), Some("20230415"));
        assert_eq!(release.year(), Some("2023"));
        assert_eq!(release.track_ids, vec![1, 2]);
    }

    #[test]
    fn test_track_map_uses_numeric_ids() {
        let mut map = HashMap::new();
        map.insert("9".to_string(), track_dto(r#"{"id": 9}"#));
        let records = to_track_map(map);
        assert!(records.contains_key(&9));
    }
}

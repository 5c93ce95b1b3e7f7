//! Audio file metadata writing and reading.
//!
//! Uses the lofty crate for tag access. Exactly two containers are
//! written: FLAC (Vorbis comments + picture blocks) for the lossless tier
//! and MP3 (ID3v2) for the lossy tiers. The [`Container`] is chosen once
//! from the tier the file was downloaded at.
//!
//! # Lyrics
//! - FLAC: the LRC text (or plain text) goes into the `LYRICS` comment
//! - MP3: plain text goes into `USLT`; time-coded lyrics additionally get a
//!   `SYLT` frame with millisecond timestamps
//!
//! # Dates
//! The release year goes into `DATE` (FLAC) or `TDRC` (MP3). Without a year
//! both containers carry "Unknown date"; on MP3 that text lives in a
//! `TXXX:DATE` frame because `TDRC` only holds timestamps.

use lofty::TextEncoding;
use lofty::config::WriteOptions;
use lofty::error::LoftyError;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::id3::v2::{
    BinaryFrame, Frame, FrameId, Id3v2Tag, SyncTextContentType, SynchronizedTextFrame,
    TimestampFormat,
};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, ItemValue, Tag, TagExt, TagItem, TagType};
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use crate::cover::{EmbeddedPicture, list_pictures};
use crate::lyrics::{Lyrics, TimedLine};
use crate::model::TrackRecord;
use crate::quality::Tier;

const UNKNOWN_ALBUM: &str = "Unknown album";
const UNKNOWN_DATE: &str = "Unknown date";
/// `TXXX` description holding a non-timestamp MP3 date.
const MP3_DATE_DESCRIPTION: &str = "DATE";

/// PADDING appended to FLAC files whose metadata chain lacks one.
const FLAC_PADDING_LEN: usize = 1024;
const FLAC_BLOCK_PADDING: u8 = 1;
const FLAC_LAST_BLOCK: u8 = 0x80;

/// Characters of lyrics shown by [`inspect`].
const LYRICS_PREVIEW_CHARS: usize = 80;

/// The two containers files are delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Flac,
    Mp3,
}

impl Container {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Lossless => Container::Flac,
            Tier::High | Tier::Mid => Container::Mp3,
        }
    }

    fn file_type(self) -> FileType {
        match self {
            Container::Flac => FileType::Flac,
            Container::Mp3 => FileType::Mpeg,
        }
    }

    fn tag_type(self) -> TagType {
        match self {
            Container::Flac => TagType::VorbisComments,
            Container::Mp3 => TagType::Id3v2,
        }
    }
}

/// Metadata errors
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: LoftyError,
    },

    #[error("{path} is {found:?}, expected {expected:?}")]
    UnsupportedContainer {
        path: PathBuf,
        expected: Container,
        found: FileType,
    },

    #[error("Invalid tag data: {0}")]
    InvalidTag(String),

    #[error("Failed to write tags to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: LoftyError,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tag writer panicked or its task never completed
    #[error("Tag writer aborted on {path}: {reason}")]
    Aborted { path: PathBuf, reason: String },
}

/// Write tags, cover and lyrics into an already-downloaded file.
///
/// The audio payload is never modified; on error the file stays as it was
/// downloaded.
pub fn embed(
    path: &Path,
    container: Container,
    track: &TrackRecord,
    lyrics: Option<&Lyrics>,
    cover: Option<&[u8]>,
) -> Result<(), MetadataError> {
    let mut tagged_file = Probe::open(path)
        .and_then(|p| p.read())
        .map_err(|source| MetadataError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if tagged_file.file_type() != container.file_type() {
        return Err(MetadataError::UnsupportedContainer {
            path: path.to_path_buf(),
            expected: container,
            found: tagged_file.file_type(),
        });
    }

    let tag_type = container.tag_type();
    let mut tag = tagged_file
        .remove(tag_type)
        .unwrap_or_else(|| Tag::new(tag_type));

    write_descriptive(&mut tag, track, container);

    if let Some(data) = cover {
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            Some(MimeType::Jpeg),
            None,
            data.to_vec(),
        ));
    }

    match container {
        Container::Flac => {
            if let Some(lyrics) = lyrics {
                let text = lyrics
                    .lrc()
                    .map(str::to_string)
                    .unwrap_or_else(|| lyrics.plain_text());
                tag.insert_text(ItemKey::Lyrics, text);
            }
            ensure_flac_padding(path)?;
            save_guarded(path, || tag.save_to_path(path, WriteOptions::default()))?;
        }
        Container::Mp3 => {
            if let Some(lyrics) = lyrics {
                tag.insert_text(ItemKey::Lyrics, lyrics.plain_text());
            }
            let mut id3 = Id3v2Tag::from(tag);
            if mp3_year(track).is_none() {
                let date = track.year.clone().unwrap_or_else(|| UNKNOWN_DATE.to_string());
                id3.insert_user_text(MP3_DATE_DESCRIPTION.to_string(), date);
            }
            if let Some(lines) = lyrics.and_then(Lyrics::timed_lines) {
                id3.insert(sylt_frame(lines)?);
            }
            save_guarded(path, || id3.save_to_path(path, WriteOptions::default()))?;
        }
    }

    tracing::debug!(track_id = track.id, path = %path.display(), "Tags written");
    Ok(())
}

fn write_descriptive(tag: &mut Tag, track: &TrackRecord, container: Container) {
    tag.remove_key(&ItemKey::TrackArtist);
    for artist in &track.artists {
        tag.push(TagItem::new(
            ItemKey::TrackArtist,
            ItemValue::Text(artist.clone()),
        ));
    }

    tag.set_title(track.title.clone());
    tag.set_album(
        track
            .album
            .clone()
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
    );

    if track.position > 0 {
        tag.insert_text(ItemKey::TrackNumber, track.position.to_string());
    }

    match container {
        Container::Flac => {
            let date = track.year.clone().unwrap_or_else(|| UNKNOWN_DATE.to_string());
            tag.insert_text(ItemKey::RecordingDate, date);
        }
        Container::Mp3 => {
            if let Some(year) = mp3_year(track) {
                tag.insert_text(ItemKey::RecordingDate, year.to_string());
            }
        }
    }

    if !track.genres.is_empty() {
        tag.insert_text(ItemKey::Genre, track.genres.join(", "));
    }
}

/// A year `TDRC` can hold: four ASCII digits.
fn mp3_year(track: &TrackRecord) -> Option<&str> {
    track
        .year
        .as_deref()
        .filter(|y| y.len() == 4 && y.bytes().all(|b| b.is_ascii_digit()))
}

/// Build an ID3v2 `SYLT` frame: UTF-8, millisecond timestamps, lyrics.
///
/// lofty reads `SYLT` back as a binary frame, so the synchronized frame is
/// encoded up front and inserted in that form.
fn sylt_frame(lines: &[TimedLine]) -> Result<Frame<'static>, MetadataError> {
    let invalid = |e: LoftyError| MetadataError::InvalidTag(e.to_string());
    let id = FrameId::new("SYLT").map_err(invalid)?;
    Ok(Frame::Binary(BinaryFrame::new(
        id,
        sylt_payload(lines).map_err(invalid)?,
    )))
}

fn sylt_payload(lines: &[TimedLine]) -> Result<Vec<u8>, LoftyError> {
    let content = lines
        .iter()
        .map(|line| {
            let ms = u32::try_from(line.timestamp_ms).unwrap_or(u32::MAX);
            (ms, line.text.clone())
        })
        .collect();

    SynchronizedTextFrame::new(
        TextEncoding::UTF8,
        *b"XXX",
        TimestampFormat::MS,
        SyncTextContentType::Lyrics,
        None,
        content,
    )
    .as_bytes()
}

/// Make sure a FLAC metadata chain ends in a PADDING block.
///
/// lofty's FLAC writer indexes past the end of its buffer when the last
/// metadata block is anything else (a bare STREAMINFO file is the common
/// case). Only the metadata chain is touched. Files that do not start with
/// a plain `fLaC` chain are left for lofty to judge.
fn ensure_flac_padding(path: &Path) -> Result<(), MetadataError> {
    let mut bytes = std::fs::read(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let Some((last, end)) = last_flac_block(&bytes) else {
        return Ok(());
    };
    if bytes[last] & !FLAC_LAST_BLOCK == FLAC_BLOCK_PADDING {
        return Ok(());
    }

    bytes[last] &= !FLAC_LAST_BLOCK;
    let mut padding = vec![0u8; 4 + FLAC_PADDING_LEN];
    padding[0] = FLAC_LAST_BLOCK | FLAC_BLOCK_PADDING;
    padding[1..4].copy_from_slice(&(FLAC_PADDING_LEN as u32).to_be_bytes()[1..]);
    bytes.splice(end..end, padding);

    std::fs::write(path, &bytes).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "Added FLAC padding block");
    Ok(())
}

/// Header offset and end offset of the block flagged last, if the chain is
/// well formed.
fn last_flac_block(bytes: &[u8]) -> Option<(usize, usize)> {
    if !bytes.starts_with(b"fLaC") {
        return None;
    }

    let mut pos = 4;
    loop {
        let header = bytes.get(pos..pos + 4)?;
        let len = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
        let end = pos + 4 + len;
        if end > bytes.len() {
            return None;
        }
        if header[0] & FLAC_LAST_BLOCK != 0 {
            return Some((pos, end));
        }
        pos = end;
    }
}

/// Run a lofty save, turning a panic inside it into an error.
fn save_guarded<F>(path: &Path, save: F) -> Result<(), MetadataError>
where
    F: FnOnce() -> Result<(), LoftyError>,
{
    match catch_unwind(AssertUnwindSafe(save)) {
        Ok(result) => result.map_err(|source| MetadataError::Write {
            path: path.to_path_buf(),
            source,
        }),
        Err(payload) => Err(MetadataError::Aborted {
            path: path.to_path_buf(),
            reason: panic_message(&*payload),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string())
}

// ============================================================================
// Inspection
// ============================================================================

/// What `inspect` reads back from a file.
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    pub path: PathBuf,
    pub format: String,
    pub duration_secs: u64,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u8>,
    pub channels: Option<u8>,
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub genre: Option<String>,
    pub lyrics_preview: Option<String>,
    pub pictures: Vec<EmbeddedPicture>,
}

/// Read an audio file's properties and main tags.
pub fn inspect(path: &Path) -> Result<FileReport, MetadataError> {
    let tagged_file = Probe::open(path)
        .and_then(|p| p.read())
        .map_err(|source| MetadataError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let properties = tagged_file.properties();
    let mut report = FileReport {
        path: path.to_path_buf(),
        format: format!("{:?}", tagged_file.file_type()),
        duration_secs: properties.duration().as_secs(),
        bitrate_kbps: properties
            .audio_bitrate()
            .or_else(|| properties.overall_bitrate()),
        sample_rate: properties.sample_rate(),
        bit_depth: properties.bit_depth(),
        channels: properties.channels(),
        pictures: list_pictures(path),
        ..Default::default()
    };

    // Get the primary tag, or fall back to the first available tag
    if let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    {
        report.title = tag.title().map(|s| s.to_string());
        report.artists = tag
            .get_strings(&ItemKey::TrackArtist)
            .map(str::to_string)
            .collect();
        report.album = tag.album().map(|s| s.to_string());
        report.album_artist = tag.get_string(&ItemKey::AlbumArtist).map(str::to_string);
        report.track_number = tag.track();
        report.genre = tag.genre().map(|s| s.to_string());
        report.lyrics_preview = tag
            .get_string(&ItemKey::Lyrics)
            .map(|l| l.chars().take(LYRICS_PREVIEW_CHARS).collect());
    }

    Ok(report)
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn opt<T: fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        }

        writeln!(f, "File: {}", self.path.display())?;
        writeln!(f, "  Format:      {}", self.format)?;
        writeln!(
            f,
            "  Duration:    {}:{:02}",
            self.duration_secs / 60,
            self.duration_secs % 60
        )?;
        writeln!(f, "  Bitrate:     {} kbps", opt(&self.bitrate_kbps))?;
        writeln!(f, "  Sample rate: {} Hz", opt(&self.sample_rate))?;
        writeln!(f, "  Bit depth:   {}", opt(&self.bit_depth))?;
        writeln!(f, "  Channels:    {}", opt(&self.channels))?;
        writeln!(f, "  Title:       {}", opt(&self.title))?;
        let artists = if self.artists.is_empty() {
            "-".to_string()
        } else {
            self.artists.join(", ")
        };
        writeln!(f, "  Artists:     {}", artists)?;
        writeln!(f, "  Album:       {}", opt(&self.album))?;
        writeln!(f, "  Album artist:{}", opt(&self.album_artist))?;
        writeln!(f, "  Track:       {}", opt(&self.track_number))?;
        writeln!(f, "  Genre:       {}", opt(&self.genre))?;
        writeln!(f, "  Lyrics:      {}", opt(&self.lyrics_preview))?;
        if self.pictures.is_empty() {
            write!(f, "  Pictures:    none")
        } else {
            write!(f, "  Pictures:")?;
            for picture in &self.pictures {
                write!(
                    f,
                    "\n    {} {} bytes{}",
                    picture.mime_type,
                    picture.size_bytes,
                    if picture.front_cover { " (front cover)" } else { "" }
                )?;
            }
            Ok(())
        }
    }
}

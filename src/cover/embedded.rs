//! List cover art embedded in audio file tags.
//!
//! Uses lofty to read picture data from:
//! - ID3v2 tags (MP3)
//! - FLAC picture blocks / Vorbis comments

use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, PictureType};
use lofty::probe::Probe;
use std::path::Path;

/// Summary of one embedded picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedPicture {
    pub mime_type: String,
    pub front_cover: bool,
    pub size_bytes: usize,
}

/// Every picture in every tag of `path`.
///
/// Returns an empty list if the file can't be read.
pub fn list_pictures(path: &Path) -> Vec<EmbeddedPicture> {
    let Ok(tagged_file) = Probe::open(path).and_then(|p| p.read()) else {
        return Vec::new();
    };

    tagged_file
        .tags()
        .iter()
        .flat_map(|tag| tag.pictures())
        .map(|picture| EmbeddedPicture {
            mime_type: match picture.mime_type() {
                Some(MimeType::Jpeg) => "image/jpeg",
                Some(MimeType::Png) => "image/png",
                Some(MimeType::Gif) => "image/gif",
                Some(MimeType::Bmp) => "image/bmp",
                Some(MimeType::Tiff) => "image/tiff",
                _ => "unknown",
            }
            .to_string(),
            front_cover: picture.pic_type() == PictureType::CoverFront,
            size_bytes: picture.data().len(),
        })
        .collect()
}

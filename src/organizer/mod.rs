//! Output naming for downloaded files and directories.
//!
//! Every path component derived from service data passes through
//! [`sanitize`] before it reaches the filesystem:
//!
//! - Track: `{artist} - {title}.{ext}`, prefixed with `{NN}. ` inside a release
//! - Release: `{NN}. [YYYY] {title} [LP|EP|SINGLE]` (index, year and label optional)
//! - Playlist: `{title}`
//!
//! Names depend only on the record itself (and the run index for releases),
//! never on download completion order.

use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{PlaylistRecord, ReleaseRecord, TrackRecord};
use crate::quality::Tier;

/// Keep letters, digits, space, `-`, `_` and `.` (plus `[` `]` when
/// `allow_brackets`), then trim trailing whitespace.
pub fn sanitize(name: &str, allow_brackets: bool) -> String {
    let kept: String = name
        .chars()
        .filter(|&c| {
            c.is_alphanumeric()
                || matches!(c, ' ' | '-' | '_' | '.')
                || (allow_brackets && matches!(c, '[' | ']'))
        })
        .collect();
    kept.trim_end().to_string()
}

/// File name for a track downloaded at `tier`.
///
/// `position` is the track's position within a release; 0 or `None` means
/// the track is downloaded on its own and gets no prefix.
pub fn track_file_name(track: &TrackRecord, tier: Tier, position: Option<u32>) -> String {
    let base = sanitize(
        &format!("{} - {}", track.primary_artist(), track.title),
        false,
    );
    match position.filter(|&p| p > 0) {
        Some(pos) => format!("{:02}. {}.{}", pos, base, tier.extension()),
        None => format!("{}.{}", base, tier.extension()),
    }
}

/// Directory name for a release. `index` is the 1-based position within an
/// artist run.
pub fn release_dir_name(release: &ReleaseRecord, index: Option<usize>) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(idx) = index {
        parts.push(format!("{:02}.", idx));
    }
    if let Some(year) = release.year() {
        parts.push(format!("[{}]", year));
    }
    parts.push(release.title.clone());
    if let Some(label) = release.label() {
        parts.push(format!("[{}]", label));
    }

    let name = sanitize(&parts.join(" "), true);
    if !is_usable_dir_name(&name) {
        format!("Release_{}", release.id)
    } else {
        name
    }
}

pub fn playlist_dir_name(playlist: &PlaylistRecord) -> String {
    let name = sanitize(&playlist.title, false);
    if !is_usable_dir_name(&name) {
        format!("Playlist_{}", playlist.id)
    } else {
        name
    }
}

/// Empty and dot-only names (`.`, `..`, `....`) would land on or above
/// the output root.
fn is_usable_dir_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && !name.chars().all(|c| c == '.')
}

/// Create `root/name`, succeeding when it already exists.
pub fn ensure_dir(root: &Path, name: &str) -> std::io::Result<PathBuf> {
    let dir = root.join(name);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Sidecar path next to an audio file: same stem, new extension.
pub fn sidecar_path(audio: &Path, extension: &str) -> PathBuf {
    audio.with_extension(extension)
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn permitted(c: char, allow_brackets: bool) -> bool {
        c.is_alphanumeric()
            || matches!(c, ' ' | '-' | '_' | '.')
            || (allow_brackets && matches!(c, '[' | ']'))
    }

    proptest! {
        /// Output only contains permitted characters
        #[test]
        fn sanitize_output_is_permitted(input in ".{0,60}", brackets in any::<bool>()) {
            let sanitized = sanitize(&input, brackets);
            for c in sanitized.chars() {
                prop_assert!(permitted(c, brackets), "Found {:?} in: {}", c, sanitized);
            }
        }

        /// Sanitizing twice changes nothing
        #[test]
        fn sanitize_is_idempotent(input in ".{0,60}", brackets in any::<bool>()) {
            let once = sanitize(&input, brackets);
            prop_assert_eq!(sanitize(&once, brackets), once.clone());
        }

        /// Sanitized names never contain path separators
        #[test]
        fn sanitize_removes_path_separators(input in "[a-zA-Z0-9 /\\\\:*?\"<>|_-]{1,50}") {
            let sanitized = sanitize(&input, true);
            prop_assert!(!sanitized.contains('/'));
            prop_assert!(!sanitized.contains('\\'));
        }

        /// Directory names are single components below the output root
        #[test]
        fn dir_names_are_never_dot_only(title in "[./ ]{0,12}") {
            let p = PlaylistRecord { id: 1, title: title.clone(), track_ids: vec![] };
            let r = ReleaseRecord { id: 2, title, ..Default::default() };
            for name in [playlist_dir_name(&p), release_dir_name(&r, None)] {
                prop_assert!(!name.trim().chars().all(|c| c == '.'), "{:?}", name);
                prop_assert!(!name.contains('/'));
            }
        }

        /// Track names keep the tier's extension and the position prefix
        #[test]
        fn track_name_shape(
            artist in ".{0,30}",
            title in ".{0,30}",
            pos in 1u32..100,
        ) {
            let t = TrackRecord {
                title,
                artists: vec![artist],
                ..Default::default()
            };
            let name = track_file_name(&t, Tier::Lossless, Some(pos));
            let prefix = format!("{:02}. ", pos);
            prop_assert!(name.starts_with(&prefix));
            prop_assert!(name.ends_with(".flac"));
        }
    }
}

//! Time-coded lyrics to SubRip (`.srt`) cues.

use std::fmt::Write;

use super::TimedLine;

/// Duration of the final cue, which has no following timestamp to end it.
pub const DEFAULT_LAST_CUE_MS: u64 = 3_000;

/// One subtitle cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// 1-based
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// Build one cue per line. Lines are stably ordered by timestamp first,
/// so start times never decrease; cue `i` ends where cue `i + 1` starts.
pub fn to_cues(lines: &[TimedLine]) -> Vec<Cue> {
    let mut ordered: Vec<&TimedLine> = lines.iter().collect();
    ordered.sort_by_key(|l| l.timestamp_ms);

    ordered
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let end_ms = ordered
                .get(i + 1)
                .map(|next| next.timestamp_ms)
                .unwrap_or(line.timestamp_ms + DEFAULT_LAST_CUE_MS);
            Cue {
                index: i + 1,
                start_ms: line.timestamp_ms,
                end_ms,
                text: line.text.clone(),
            }
        })
        .collect()
}

/// Render lines as a complete `.srt` document.
pub fn to_srt(lines: &[TimedLine]) -> String {
    let mut out = String::new();
    for cue in to_cues(lines) {
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            timestamp(cue.start_ms),
            timestamp(cue.end_ms),
            cue.text
        );
    }
    out
}

/// `HH:MM:SS,mmm`
fn timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

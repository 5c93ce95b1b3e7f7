//! Lyrics classification.
//!
//! Raw lyrics from the service are either prose or LRC-style time-coded
//! text (`[mm:ss.xx]line`). The classification made here decides every
//! downstream path: unsynchronized tag vs. synchronized tag, and `.txt` vs.
//! `.lrc`/`.srt` sidecars.

mod srt;

pub use srt::to_srt;

use regex::Regex;
use std::sync::LazyLock;

/// One or more leading `[mm:ss]`, `[mm:ss.xx]` or `[mm:ss:xx]` markers.
static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[(\d{1,3}):(\d{1,2})(?:[.:](\d{1,3}))?\]").expect("valid timestamp pattern")
});

/// A time-coded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedLine {
    /// Offset from the start of the track
    pub timestamp_ms: u64,
    pub text: String,
}

/// Classified lyrics payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lyrics {
    Plain(String),
    Timed {
        /// Text as received, written verbatim to `.lrc`
        raw: String,
        /// Marked lines in source order
        lines: Vec<TimedLine>,
    },
}

impl Lyrics {
    /// Classify `raw`. Any line starting with a timestamp marker makes the
    /// whole text time-coded; unmarked lines are then ignored.
    pub fn classify(raw: &str) -> Self {
        let lines: Vec<TimedLine> = raw.lines().filter_map(parse_line).collect();
        if lines.is_empty() {
            Lyrics::Plain(raw.to_string())
        } else {
            Lyrics::Timed {
                raw: raw.to_string(),
                lines,
            }
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self, Lyrics::Timed { .. })
    }

    /// Text without timestamps.
    pub fn plain_text(&self) -> String {
        match self {
            Lyrics::Plain(text) => text.clone(),
            Lyrics::Timed { lines, .. } => lines
                .iter()
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn timed_lines(&self) -> Option<&[TimedLine]> {
        match self {
            Lyrics::Plain(_) => None,
            Lyrics::Timed { lines, .. } => Some(lines),
        }
    }

    /// Raw LRC text, when time-coded.
    pub fn lrc(&self) -> Option<&str> {
        match self {
            Lyrics::Plain(_) => None,
            Lyrics::Timed { raw, .. } => Some(raw),
        }
    }
}

/// Parse one line; the first marker sets the time, further leading markers
/// are stripped from the text.
fn parse_line(line: &str) -> Option<TimedLine> {
    let caps = TIMESTAMP.captures(line)?;
    let minutes: u64 = caps[1].parse().ok()?;
    let seconds: u64 = caps[2].parse().ok()?;
    let millis = caps.get(3).map(|m| fraction_to_ms(m.as_str())).unwrap_or(0);

    let mut rest = &line[caps.get(0).map_or(0, |m| m.end())..];
    while let Some(m) = TIMESTAMP.find(rest) {
        rest = &rest[m.end()..];
    }

    Some(TimedLine {
        timestamp_ms: (minutes * 60 + seconds) * 1000 + millis,
        text: rest.trim().to_string(),
    })
}

/// `5` -> 500, `50` -> 500, `123` -> 123
fn fraction_to_ms(digits: &str) -> u64 {
    let mut padded = digits.to_string();
    while padded.len() < 3 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

//! Audio quality tiers and availability probing.
//!
//! A track can be offered in up to three tiers. Which ones are actually
//! obtainable varies per track (and over time), so availability is always
//! probed fresh against the service and never cached across runs.
//!
//! # Tiers
//! - `lossless` - FLAC
//! - `high` - MP3 320 kbps
//! - `mid` - MP3 128 kbps
//!
//! The resolver reports facts only; whether a substituted tier is acceptable
//! is the caller's fallback policy.

mod resolver;

pub use resolver::QualityResolver;
pub(crate) use resolver::evidence_from_detail;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A requestable audio quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[serde(alias = "flac")]
    Lossless,
    High,
    Mid,
}

impl Tier {
    /// Fixed degradation order, best first.
    pub const ORDER: [Tier; 3] = [Tier::Lossless, Tier::High, Tier::Mid];

    /// Value of the service's `quality` parameter.
    pub fn api_name(self) -> &'static str {
        match self {
            Tier::Lossless => "flac",
            Tier::High => "high",
            Tier::Mid => "mid",
        }
    }

    /// File extension of the container this tier is delivered in.
    pub fn extension(self) -> &'static str {
        match self {
            Tier::Lossless => "flac",
            Tier::High | Tier::Mid => "mp3",
        }
    }

    /// Nominal bitrate used for size estimates (FLAC varies, ~900 kbps typical).
    pub fn nominal_kbps(self) -> u32 {
        match self {
            Tier::Lossless => 900,
            Tier::High => 320,
            Tier::Mid => 128,
        }
    }

    /// Estimated file size in bytes for a track of `duration_secs`.
    pub fn estimated_bytes(self, duration_secs: u32) -> u64 {
        u64::from(duration_secs) * u64::from(self.nominal_kbps()) * 1000 / 8
    }

    fn flag(self) -> TierSet {
        match self {
            Tier::Lossless => TierSet::LOSSLESS,
            Tier::High => TierSet::HIGH,
            Tier::Mid => TierSet::MID,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Lossless => write!(f, "lossless"),
            Tier::High => write!(f, "high"),
            Tier::Mid => write!(f, "mid"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f" | "flac" | "lossless" => Ok(Tier::Lossless),
            "h" | "high" | "320" => Ok(Tier::High),
            "m" | "mid" | "128" => Ok(Tier::Mid),
            other => Err(format!(
                "unknown quality '{}' (expected flac, high or mid)",
                other
            )),
        }
    }
}

bitflags! {
    /// Set of tiers confirmed obtainable for a track.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TierSet: u8 {
        const LOSSLESS = 1 << 0;
        const HIGH = 1 << 1;
        const MID = 1 << 2;
    }
}

/// Codec/bitrate evidence backing an availability claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvidence {
    pub codec: String,
    /// Bits per second, when the service reports it
    pub bitrate: Option<u32>,
}

/// Per-track availability of each tier.
#[derive(Debug, Clone, Default)]
pub struct QualityProbe {
    pub track_id: u64,
    available: TierSet,
    evidence: Vec<(Tier, FileEvidence)>,
}

impl QualityProbe {
    pub fn new(track_id: u64) -> Self {
        Self {
            track_id,
            ..Default::default()
        }
    }

    /// Mark `tier` as obtainable, optionally with the file that proves it.
    pub fn confirm(&mut self, tier: Tier, evidence: Option<FileEvidence>) {
        self.available |= tier.flag();
        if let Some(evidence) = evidence
            && self.evidence(tier).is_none()
        {
            self.evidence.push((tier, evidence));
        }
    }

    pub fn is_available(&self, tier: Tier) -> bool {
        self.available.contains(tier.flag())
    }

    pub fn evidence(&self, tier: Tier) -> Option<&FileEvidence> {
        self.evidence
            .iter()
            .find(|(t, _)| *t == tier)
            .map(|(_, evidence)| evidence)
    }

    /// Obtainable tiers, best first.
    pub fn available_tiers(&self) -> Vec<Tier> {
        Tier::ORDER
            .into_iter()
            .filter(|t| self.is_available(*t))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

/// Pick the tier to download.
///
/// The requested tier wins when available; otherwise the first available tier
/// in [`Tier::ORDER`]. `None` means nothing is obtainable.
pub fn recommend(probe: &QualityProbe, requested: Tier) -> Option<Tier> {
    if probe.is_available(requested) {
        return Some(requested);
    }
    Tier::ORDER.into_iter().find(|t| probe.is_available(*t))
}

/// Format a byte count as megabytes for reports.
pub fn format_size(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Human-readable availability report for one track.
pub fn format_report(probe: &QualityProbe) -> String {
    let mut out = format!("Quality report for track {}\n", probe.track_id);
    for tier in Tier::ORDER {
        let mark = if probe.is_available(tier) { "yes" } else { "no " };
        let detail = match probe.evidence(tier) {
            Some(FileEvidence {
                codec,
                bitrate: Some(bps),
            }) => format!(" ({} {} kbps)", codec, bps / 1000),
            Some(FileEvidence {
                codec,
                bitrate: None,
            }) => format!(" ({})", codec),
            None => String::new(),
        };
        out.push_str(&format!("  {:<9} {}{}\n", tier.to_string(), mark, detail));
    }
    match Tier::ORDER.into_iter().find(|t| probe.is_available(*t)) {
        Some(best) => out.push_str(&format!("  Best available: {}\n", best)),
        None => out.push_str("  No tier available\n"),
    }
    out
}

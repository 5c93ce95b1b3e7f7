//! Read-only service reports: quality, track, release, artist, lyrics.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::runtime::Runtime;

use super::format_duration;
use crate::config::Config;
use crate::downloader::{Downloader, select_releases};
use crate::lyrics::Lyrics;
use crate::quality::{Tier, evidence_from_detail, format_report, format_size, recommend};

/// Per-tier availability report with the recommendation for the preferred tier
pub fn cmd_check_quality(rt: &Runtime, config: Arc<Config>, track_id: u64) -> anyhow::Result<()> {
    let downloader = Downloader::new(Arc::clone(&config))?;

    rt.block_on(async {
        let probe = downloader.resolver().probe(track_id).await?;
        print!("{}", format_report(&probe));

        let requested = config.download.quality;
        match recommend(&probe, requested) {
            Some(tier) if tier == requested => println!("  Requested {}: available", requested),
            Some(tier) if config.download.fallback_to_lower_quality => {
                println!("  Requested {}: unavailable, would download {}", requested, tier)
            }
            Some(_) => println!("  Requested {}: unavailable, fallback disabled", requested),
            None => println!("  Requested {}: nothing to download", requested),
        }
        Ok::<_, anyhow::Error>(())
    })
}

/// Extended track view with size estimates
pub fn cmd_track_info(rt: &Runtime, config: Arc<Config>, track_id: u64) -> anyhow::Result<()> {
    let downloader = Downloader::new(config)?;

    rt.block_on(async {
        let track = downloader.client().track(track_id).await?;

        println!("Track {}", track.id);
        println!("  Title:    {}", track.title);
        println!("  Artists:  {}", track.artist_line());
        println!("  Album:    {}", track.album.as_deref().unwrap_or("-"));
        if track.position > 0 {
            println!("  Position: {}", track.position);
        }
        println!("  Year:     {}", track.year.as_deref().unwrap_or("-"));
        println!("  Duration: {}", format_duration(u64::from(track.duration_secs)));
        if !track.genres.is_empty() {
            println!("  Genres:   {}", track.genres.join(", "));
        }
        println!("  Explicit: {}", yes_no(track.explicit));
        println!("  Lyrics:   {}", yes_no(track.has_lyrics));
        println!("  Lossless: {}", yes_no(track.has_lossless));
        println!();

        let probe = downloader.resolver().probe_record(&track).await;
        print!("{}", format_report(&probe));

        let available = probe.available_tiers();
        if !available.is_empty() {
            println!("  Estimated size:");
            for tier in available {
                println!(
                    "    {:<9} ~{}",
                    tier.to_string(),
                    format_size(tier.estimated_bytes(track.duration_secs))
                );
            }
        }
        Ok::<_, anyhow::Error>(())
    })
}

/// Release track list and availability tally
pub fn cmd_release_info(rt: &Runtime, config: Arc<Config>, release_id: u64) -> anyhow::Result<()> {
    let downloader = Downloader::new(config)?;

    rt.block_on(async {
        let bundle = downloader.client().release(release_id).await?;
        let release = &bundle.release;

        println!("Release {}", release.id);
        println!("  Title:   {}", release.title);
        if !release.artists.is_empty() {
            println!("  Artists: {}", release.artists.join(", "));
        }
        println!("  Date:    {}", release.date.as_deref().unwrap_or("-"));
        println!(
            "  Type:    {}",
            release
                .release_type
                .as_deref()
                .unwrap_or(release.kind().as_str())
        );
        println!();

        let mut tracks: Vec<_> = release
            .track_ids
            .iter()
            .filter_map(|id| bundle.tracks.get(id))
            .collect();
        tracks.sort_by_key(|t| t.position);

        let mut total_secs = 0u64;
        let mut tally = [0usize; 3];
        for track in &tracks {
            total_secs += u64::from(track.duration_secs);
            println!(
                "  {:02}. {} - {} ({}){}",
                track.position,
                track.artist_line(),
                track.title,
                format_duration(u64::from(track.duration_secs)),
                if track.explicit { " [E]" } else { "" }
            );
            let probe = evidence_from_detail(track);
            for (i, tier) in Tier::ORDER.into_iter().enumerate() {
                if probe.is_available(tier) {
                    tally[i] += 1;
                }
            }
        }

        println!();
        println!("  Tracks:   {}", release.track_ids.len());
        println!("  Duration: {}", format_duration(total_secs));
        println!(
            "  Lossless: {}",
            tracks.iter().filter(|t| t.has_lossless).count()
        );
        println!("  Explicit: {}", tracks.iter().filter(|t| t.explicit).count());
        println!("  Listed availability:");
        for (i, tier) in Tier::ORDER.into_iter().enumerate() {
            println!("    {:<9} {}/{}", tier.to_string(), tally[i], tracks.len());
        }
        Ok::<_, anyhow::Error>(())
    })
}

/// Artist discography, newest first
pub fn cmd_artist_info(
    rt: &Runtime,
    config: Arc<Config>,
    artist_id: u64,
    limit: usize,
) -> anyhow::Result<()> {
    let downloader = Downloader::new(config)?;

    rt.block_on(async {
        let ids = downloader
            .client()
            .artist_release_ids(artist_id, limit)
            .await?;
        let releases = downloader.client().releases(&ids).await?;
        let releases = select_releases(releases, 0, false);

        println!("Artist {} - {} releases", artist_id, releases.len());
        for release in &releases {
            println!(
                "  [{}] {} ({}, {} tracks)",
                release.year().unwrap_or("????"),
                release.title,
                release.kind().as_str(),
                release.track_ids.len()
            );
        }

        let album_like = releases.iter().filter(|r| r.is_album_like()).count();
        let years: BTreeSet<&str> = releases.iter().filter_map(|r| r.year()).collect();

        println!();
        println!("  Album-like: {}", album_like);
        println!("  Total:      {}", releases.len());
        if let (Some(first), Some(last)) = (years.first(), years.last()) {
            println!("  Active:     {}-{}", first, last);
        }
        Ok::<_, anyhow::Error>(())
    })
}

/// Print raw lyrics with their classification
pub fn cmd_lyrics(rt: &Runtime, config: Arc<Config>, track_id: u64) -> anyhow::Result<()> {
    let downloader = Downloader::new(config)?;

    rt.block_on(async {
        let Some(raw) = downloader.client().lyrics(track_id).await? else {
            println!("No lyrics for track {}", track_id);
            return Ok(());
        };

        match Lyrics::classify(&raw) {
            Lyrics::Timed { lines, .. } => {
                println!("Time-coded lyrics ({} lines)", lines.len())
            }
            Lyrics::Plain(_) => println!("Plain lyrics"),
        }
        println!();
        println!("{}", raw);
        Ok::<_, anyhow::Error>(())
    })
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

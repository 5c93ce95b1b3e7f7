//! CLI command definitions and dispatch.
//!
//! Each group of subcommands lives in its own submodule:
//! - `download`: track, release, playlist and artist downloads
//! - `info`: quality, track, release and artist reports, lyrics printing
//! - `local`: file inspection and config bootstrap (no network)

mod download;
mod info;
mod local;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::quality::Tier;

pub use download::{Target, cmd_download};
pub use info::{cmd_artist_info, cmd_check_quality, cmd_lyrics, cmd_release_info, cmd_track_info};
pub use local::{cmd_init_config, cmd_inspect};

/// Zvuk downloader CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Overrides applied on top of the config file
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Service token
    #[arg(long, global = true, env = "ZVUK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Output directory
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Preferred quality: flac, high or mid
    #[arg(short, long, global = true)]
    pub quality: Option<Tier>,

    /// Fail instead of accepting another quality
    #[arg(long, global = true)]
    pub no_fallback: bool,

    /// Request the preferred quality without probing availability first
    #[arg(long, global = true)]
    pub no_verify: bool,

    /// Write .lrc/.txt lyrics next to each file
    #[arg(long, global = true)]
    pub save_lyrics: bool,

    /// Write .srt subtitles next to each file (time-coded lyrics only)
    #[arg(long, global = true)]
    pub save_subtitles: bool,

    /// Do not write tags
    #[arg(long, global = true)]
    pub no_metadata: bool,

    /// Do not embed cover art
    #[arg(long, global = true)]
    pub no_cover: bool,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Download tracks by id
    #[command(visible_alias = "dl")]
    Track {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Download releases (albums, EPs, singles) by id
    #[command(visible_alias = "dlr")]
    Release {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Download playlists by id
    #[command(visible_alias = "dlp")]
    Playlist {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Download an artist's newest releases
    #[command(visible_alias = "dla")]
    Artist {
        #[arg(required = true)]
        ids: Vec<u64>,
        /// Maximum releases per artist (0 = all)
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Only albums (typed as album or with 7+ tracks)
        #[arg(long)]
        skip_singles: bool,
    },
    /// Show which qualities a track is available in
    #[command(visible_alias = "chk")]
    CheckQuality { id: u64 },
    /// Show track details, availability and size estimates
    #[command(visible_alias = "info")]
    TrackInfo { id: u64 },
    /// Show a release's track list and availability summary
    #[command(visible_alias = "rinfo")]
    ReleaseInfo { id: u64 },
    /// Show an artist's discography
    #[command(visible_alias = "ainfo")]
    ArtistInfo {
        id: u64,
        /// Maximum releases to list (0 = all)
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Print a track's lyrics and their format
    #[command(visible_alias = "txt")]
    Lyrics { id: u64 },
    /// Show the tags and pictures of a downloaded file
    Inspect { path: PathBuf },
    /// Write a starter config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified (meaning usage should be shown).
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let Some(command) = &cli.command else {
        return Ok(false);
    };

    // Commands that never touch the network
    match command {
        Commands::Inspect { path } => {
            cmd_inspect(path)?;
            return Ok(true);
        }
        Commands::InitConfig { force } => {
            cmd_init_config(cli.global.config.as_deref(), *force)?;
            return Ok(true);
        }
        _ => {}
    }

    let config = build_config(&cli.global)?;
    let rt = Runtime::new()?;

    match command {
        Commands::Track { ids } => cmd_download(&rt, config, Target::Tracks(ids.clone()))?,
        Commands::Release { ids } => cmd_download(&rt, config, Target::Releases(ids.clone()))?,
        Commands::Playlist { ids } => {
            cmd_download(&rt, config, Target::Playlists(ids.clone()))?
        }
        Commands::Artist {
            ids,
            limit,
            skip_singles,
        } => cmd_download(
            &rt,
            config,
            Target::Artists {
                ids: ids.clone(),
                limit: *limit,
                skip_singles: *skip_singles,
            },
        )?,
        Commands::CheckQuality { id } => cmd_check_quality(&rt, config, *id)?,
        Commands::TrackInfo { id } => cmd_track_info(&rt, config, *id)?,
        Commands::ReleaseInfo { id } => cmd_release_info(&rt, config, *id)?,
        Commands::ArtistInfo { id, limit } => cmd_artist_info(&rt, config, *id, *limit)?,
        Commands::Lyrics { id } => cmd_lyrics(&rt, config, *id)?,
        Commands::Inspect { .. } | Commands::InitConfig { .. } => {}
    }

    Ok(true)
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Load the config file, apply command-line overrides and freeze it.
pub(crate) fn build_config(global: &GlobalArgs) -> anyhow::Result<Arc<Config>> {
    let mut config = config::load(global.config.as_deref())?;
    apply_overrides(&mut config, global);
    config.validate()?;
    Ok(Arc::new(config))
}

fn apply_overrides(config: &mut Config, global: &GlobalArgs) {
    let dl = &mut config.download;

    if let Some(token) = global.token.as_ref().filter(|t| !t.trim().is_empty()) {
        config.service.token = token.trim().to_string();
    }
    if let Some(output) = &global.output {
        dl.output_dir = output.clone();
    }
    if let Some(quality) = global.quality {
        dl.quality = quality;
    }
    if global.no_fallback {
        dl.fallback_to_lower_quality = false;
    }
    if global.no_verify {
        dl.verify_quality = false;
    }
    if global.save_lyrics {
        dl.save_lyrics = true;
    }
    if global.save_subtitles {
        dl.save_subtitles = true;
    }
    if global.no_metadata {
        dl.embed_metadata = false;
    }
    if global.no_cover {
        dl.embed_cover = false;
    }
}

/// `m:ss`
pub(crate) fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

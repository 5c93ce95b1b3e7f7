//! Download commands.

use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::downloader::Downloader;

/// What a download command works on.
#[derive(Debug, Clone)]
pub enum Target {
    Tracks(Vec<u64>),
    Releases(Vec<u64>),
    Playlists(Vec<u64>),
    Artists {
        ids: Vec<u64>,
        limit: usize,
        skip_singles: bool,
    },
}

/// Run a download and print the run summary.
///
/// Ctrl-C stops waiting on in-flight work; the summary then reflects what
/// finished so far.
pub fn cmd_download(rt: &Runtime, config: Arc<Config>, target: Target) -> anyhow::Result<()> {
    let output_dir = config.download.output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .map_err(|e| anyhow::anyhow!("Cannot create output directory {:?}: {}", output_dir, e))?;

    let downloader = Downloader::new(config)?;

    rt.block_on(async {
        tokio::select! {
            _ = run_target(&downloader, &target) => {}
            _ = tokio::signal::ctrl_c() => {
                eprintln!();
                eprintln!("Interrupted - showing partial results");
            }
        }
    });

    print_summary(&downloader);
    Ok(())
}

async fn run_target(downloader: &Downloader, target: &Target) {
    let output_dir = downloader.config().download.output_dir.clone();

    match target {
        Target::Tracks(ids) => {
            for &id in ids {
                match downloader.download_track(id, &output_dir, None).await {
                    Some(outcome) => println!("✓ Track {} -> {}", id, outcome.path.display()),
                    None => println!("✗ Track {} failed", id),
                }
            }
        }
        Target::Releases(ids) => {
            for &id in ids {
                let outcome = downloader.download_release(id, None).await;
                println!(
                    "{} Release {}: {}/{} tracks",
                    mark(outcome.is_success()),
                    id,
                    outcome.succeeded,
                    outcome.total
                );
            }
        }
        Target::Playlists(ids) => {
            for &id in ids {
                let outcome = downloader.download_playlist(id).await;
                println!(
                    "{} Playlist {}: {}/{} tracks",
                    mark(outcome.is_success()),
                    id,
                    outcome.succeeded,
                    outcome.total
                );
            }
        }
        Target::Artists {
            ids,
            limit,
            skip_singles,
        } => {
            for &id in ids {
                let outcome = downloader.download_artist(id, *limit, *skip_singles).await;
                println!(
                    "{} Artist {}: {}/{} releases, {}/{} tracks",
                    mark(outcome.releases_succeeded > 0),
                    id,
                    outcome.releases_succeeded,
                    outcome.releases_selected,
                    outcome.tracks_succeeded,
                    outcome.tracks_total
                );
            }
        }
    }
}

fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}

fn print_summary(downloader: &Downloader) {
    println!();
    println!("{}", downloader.stats());

    let failures = downloader.failures();
    if failures.is_empty() {
        return;
    }

    println!();
    println!("Failures ({}):", failures.len());
    for failure in &failures {
        println!("  ✗ {}", failure);
    }
}

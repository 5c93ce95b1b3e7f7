//! Commands that only touch the local filesystem.

use std::path::Path;

use crate::config::{self, Config};
use crate::metadata;

/// Show the tags, audio properties and pictures of a file
pub fn cmd_inspect(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {:?}", path);
    }
    let report = metadata::inspect(path)?;
    println!("{}", report);
    Ok(())
}

/// Write a default config file for the user to fill in
pub fn cmd_init_config(explicit: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?} (use --force to overwrite)",
            path
        );
    }

    config::save(&Config::default(), &path)?;
    println!("Wrote {:?}", path);
    println!("Set service.token (or ZVUK_TOKEN) before downloading.");
    Ok(())
}

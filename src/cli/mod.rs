//! Command-line interface for zvuk-dl.
//!
//! Download commands (tracks, releases, playlists, artists), read-only
//! service reports, and local file inspection.

mod commands;

pub use commands::{Cli, Commands, GlobalArgs, run_command};

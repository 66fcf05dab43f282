//! Command-line interface for `booru-ingest`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use domains::SafetyRating;

#[derive(Debug, Parser)]
#[command(name = "booru-ingest", version, about = "Ingest media into a booru content store")]
pub struct Cli {
    /// Settings file; `booru.toml` in the working directory is used when present.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest a local file or a URL as a new post and print it as JSON.
    Ingest {
        /// Local path or http(s) URL.
        source: String,

        #[arg(long, default_value = "safe")]
        safety: SafetyRating,

        /// Free-text tags, separated by spaces or commas.
        #[arg(long)]
        tags: Option<String>,

        /// Where the content came from.
        #[arg(long, default_value = "")]
        origin: String,

        /// Render the default thumbnail right away.
        #[arg(long)]
        thumbnail: bool,
    },

    /// Resolve (and render if needed) the thumbnail of stored content.
    Thumbnail {
        /// Canonical post name, i.e. the file name under `posts/`.
        name: String,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,
    },
}

//! Tag and cover editing for MP3 files, driven by ffprobe and ffmpeg.
//!
//! [`metadata::MetadataProbe`] reads, [`convert::MetadataWriter`] writes and
//! [`processing::Editor`] runs both in background tasks with a per-file busy
//! flag.

use clap::Parser;

pub mod cache;
pub mod commands;
pub mod config;
pub mod convert;
pub mod error;
pub mod fs_scan;
pub mod metadata;
pub mod models;
pub mod path_utils;
pub mod processing;
pub mod scratch;
pub mod system_check;
pub mod tools;

#[cfg(test)]
mod testing;

pub use config::EditorConfig;
pub use convert::MetadataWriter;
pub use error::EditorError;
pub use metadata::MetadataProbe;
pub use models::{AudioAsset, CoverImage, LoadedMetadata, Metadata};
pub use processing::{AssetHandle, Completion, Editor};

fn init_logging() {
    let level = std::env::var("MTE_LOG")
        .ok()
        .and_then(|v| v.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let mut clog = colog::default_builder();
    clog.filter(None, level);
    clog.init();
}

/// Command line entry point.
pub fn run() -> anyhow::Result<()> {
    init_logging();
    let cli = commands::Cli::parse();
    let editor_config = EditorConfig::from_env();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::execute(cli, Editor::new(editor_config)))
}

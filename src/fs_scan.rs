use std::path::{Path, PathBuf};

use log::warn;
use walkdir::WalkDir;

use crate::error::{EditorError, Result};

const SUPPORTED_EXTENSIONS: [&str; 1] = ["mp3"];

/// Every `.mp3` under `directory_path`, sorted. Hidden files (our own partial
/// outputs and backups included) are skipped.
pub fn scan_directory_for_audio_files(directory_path: &Path) -> Result<Vec<PathBuf>> {
    if !directory_path.is_dir() {
        return Err(EditorError::io(
            format!(
                "指定されたパスはディレクトリではありません: {}",
                directory_path.display()
            ),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }

    let mut audio_files = Vec::new();
    let walker = WalkDir::new(directory_path)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && has_supported_extension(entry.path()) {
            audio_files.push(entry.into_path());
        }
    }

    audio_files.sort();
    Ok(audio_files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{EditorError, Result};

/// Extension every saved file gets.
pub const OUTPUT_EXTENSION: &str = "mp3";

const MAX_STEM_BYTES: usize = 200;

const RESERVED_WINDOWS_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[cfg(windows)]
fn is_extended_prefix(p: &str) -> bool {
    p.starts_with(r"\\?\") || p.starts_with(r"\\.\")
}

#[cfg(windows)]
fn to_extended_internal(abs: &str) -> String {
    if is_extended_prefix(abs) {
        abs.to_string()
    } else if let Some(rest) = abs.strip_prefix(r"\\") {
        // UNC path: \\server\share -> \\?\UNC\server\share
        format!(r"\\?\UNC\{}", rest)
    } else {
        format!(r"\\?\{}", abs)
    }
}

#[cfg(windows)]
fn to_extended_length_path_if_needed(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.len() < 240 || is_extended_prefix(&s) {
        return path.to_path_buf();
    }
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    PathBuf::from(to_extended_internal(&abs.to_string_lossy()))
}

#[cfg(not(windows))]
fn to_extended_length_path_if_needed(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// Path as handed to ffmpeg/ffprobe; long Windows paths get the `\\?\` prefix.
pub fn cmd_path_arg(path: &Path) -> OsString {
    to_extended_length_path_if_needed(path).into_os_string()
}

/// Turns a tag title into a file stem.
///
/// Path separators, characters Windows rejects and control characters become
/// `_`. Dots and whitespace at either end are dropped, so the file is never
/// hidden, and the result is capped at 200 bytes. A Windows device name before
/// the first dot gets a `_` appended. Returns `None` when nothing usable is left.
pub fn sanitize_filename(title: &str) -> Option<String> {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let edge = |c: char| c == '.' || c.is_whitespace();
    let mut stem = replaced.trim_matches(edge).to_string();

    if stem.len() > MAX_STEM_BYTES {
        let mut cut = MAX_STEM_BYTES;
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        stem.truncate(cut);
        stem = stem.trim_end_matches(edge).to_string();
    }

    if stem.is_empty() {
        return None;
    }

    let device_len = stem.split('.').next().map(str::len).unwrap_or_default();
    if RESERVED_WINDOWS_NAMES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(&stem[..device_len]))
    {
        stem.insert(device_len, '_');
    }

    Some(stem)
}

/// `<dir of source>/<sanitized title>.mp3`
pub fn target_path_for_title(source: &Path, title: &str) -> Result<PathBuf> {
    let stem = sanitize_filename(title).ok_or_else(|| EditorError::InvalidTitle {
        title: title.to_string(),
    })?;
    Ok(parent_dir(source).join(format!("{}.{}", stem, OUTPUT_EXTENSION)))
}

/// Hidden, uniquely named sibling the conversion tool writes into.
pub fn temp_output_path(target: &Path) -> PathBuf {
    parent_dir(target).join(format!(".mte-{}.partial.{}", Uuid::new_v4(), OUTPUT_EXTENSION))
}

/// Hidden, uniquely named sibling the original is parked at during commit.
pub fn backup_path(source: &Path) -> PathBuf {
    parent_dir(source).join(format!(".mte-{}.bak", Uuid::new_v4()))
}

/// File name without its extension, used as the fallback title.
pub fn file_stem_lossy(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

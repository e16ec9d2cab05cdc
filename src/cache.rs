use std::path::{Path, PathBuf};

use crate::error::{EditorError, Result};
use crate::models::{CoverImage, Metadata};
use crate::path_utils::sanitize_filename;

/// `<user cache>/mp3tageditor/album_art`
pub fn cover_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("mp3tageditor")
        .join("album_art")
}

/// Keeps a copy of the artwork in the user cache, named after album and
/// artist (or the title when the album is empty).
pub async fn save_cover_to_cache(cover: &CoverImage, metadata: &Metadata) -> Result<PathBuf> {
    save_cover_in(&cover_cache_dir(), cover, metadata).await
}

pub(crate) async fn save_cover_in(
    cache_dir: &Path,
    cover: &CoverImage,
    metadata: &Metadata,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(cache_dir).await.map_err(|e| {
        EditorError::io(
            format!("キャッシュディレクトリの作成に失敗しました: {}", cache_dir.display()),
            e,
        )
    })?;

    let label = if metadata.album.is_empty() {
        &metadata.title
    } else {
        &metadata.album
    };
    // ファイル名を生成（アルバム名とアーティスト名から）
    let stem = match (sanitize_filename(label), sanitize_filename(&metadata.artist)) {
        (Some(label), Some(artist)) => format!("{}_{}", label, artist),
        (Some(label), None) => label,
        (None, Some(artist)) => artist,
        (None, None) => "cover".to_string(),
    };
    let file_path = cache_dir.join(format!("{}.{}", stem, cover.extension()));

    export_cover(cover, &file_path).await?;
    Ok(file_path)
}

/// Writes the raw artwork bytes to `path`.
pub async fn export_cover(cover: &CoverImage, path: &Path) -> Result<()> {
    tokio::fs::write(path, cover.bytes()).await.map_err(|e| {
        EditorError::io(
            format!("ファイルの書き込みに失敗しました: {}", path.display()),
            e,
        )
    })
}

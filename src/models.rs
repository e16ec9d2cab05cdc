use std::fmt;
use std::path::{Path, PathBuf};

use base64::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EditorError, Result};

/// The three tags this editor reads and writes.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub album: String,
    pub artist: String,
}

impl Metadata {
    pub fn new(
        title: impl Into<String>,
        album: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            album: album.into(),
            artist: artist.into(),
        }
    }

    pub fn has_title(&self) -> bool {
        !self.title.is_empty()
    }
}

/// Raw encoded artwork bytes. Never decoded.
#[derive(Clone, PartialEq, Eq)]
pub struct CoverImage(Vec<u8>);

impl CoverImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads a local image file to use as the new cover.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            EditorError::io(
                format!("画像ファイルを読み込めませんでした: {}", path.display()),
                e,
            )
        })?;
        if bytes.is_empty() {
            return Err(EditorError::io(
                format!("画像ファイルが空です: {}", path.display()),
                std::io::Error::from(std::io::ErrorKind::InvalidData),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn from_base64(encoded: &str) -> std::result::Result<Self, base64::DecodeError> {
        BASE64_STANDARD.decode(encoded.trim()).map(Self)
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.0)
    }

    /// File extension matching the image signature, `jpg` when unknown.
    ///
    /// ffmpeg's image demuxer picks the codec from the extension, so a PNG
    /// staged as `.jpg` would not be read back.
    pub fn extension(&self) -> &'static str {
        infer::get(&self.0)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .map(|kind| kind.extension())
            .unwrap_or("jpg")
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        infer::get(&self.0)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .map(|kind| kind.mime_type())
    }
}

impl fmt::Debug for CoverImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverImage")
            .field("len", &self.0.len())
            .field("mime", &self.mime_type())
            .finish()
    }
}

impl Serialize for CoverImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for CoverImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// What a probe produced for one file.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct LoadedMetadata {
    pub metadata: Metadata,
    pub cover: Option<CoverImage>,
}

/// The file currently being edited and its in-memory snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub metadata: Metadata,
    pub cover: Option<CoverImage>,
}

impl AudioAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            metadata: Metadata::default(),
            cover: None,
        }
    }

    pub fn apply_loaded(&mut self, loaded: LoadedMetadata) {
        self.metadata = loaded.metadata;
        self.cover = loaded.cover;
    }

    pub fn set_metadata(&mut self, metadata: Metadata, cover: Option<CoverImage>) {
        self.metadata = metadata;
        self.cover = cover;
    }
}

/// One entry of a batch probe.
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFileResult {
    pub file_path: PathBuf,
    pub loaded: Option<LoadedMetadata>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn extension_follows_signature() {
        assert_eq!(CoverImage::new(PNG_MAGIC.to_vec()).extension(), "png");
        assert_eq!(CoverImage::new(JPEG_MAGIC.to_vec()).extension(), "jpg");
        assert_eq!(CoverImage::new(b"not an image".to_vec()).extension(), "jpg");
        assert_eq!(CoverImage::new(b"not an image".to_vec()).mime_type(), None);
    }

    #[test]
    fn cover_serializes_as_base64() {
        let loaded = LoadedMetadata {
            metadata: Metadata::new("song", "", ""),
            cover: Some(CoverImage::new(vec![1, 2, 3])),
        };
        let json = serde_json::to_value(&loaded).unwrap();
        assert_eq!(json["cover"], "AQID");
        assert_eq!(json["metadata"]["title"], "song");

        let back: LoadedMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, loaded);
    }

    #[test]
    fn bad_base64_is_rejected() {
        assert!(CoverImage::from_base64("***").is_err());
    }

    #[tokio::test]
    async fn empty_cover_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();
        assert!(CoverImage::from_file(&path).await.is_err());

        std::fs::write(&path, JPEG_MAGIC).unwrap();
        let cover = CoverImage::from_file(&path).await.unwrap();
        assert_eq!(cover.bytes(), JPEG_MAGIC);
    }

    #[test]
    fn asset_starts_empty() {
        let mut asset = AudioAsset::new("/music/song.mp3");
        assert!(!asset.metadata.has_title());
        asset.set_metadata(Metadata::new("t", "a", "b"), None);
        assert_eq!(asset.metadata.artist, "b");
    }
}

use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::models::{LoadedMetadata, Metadata};
use crate::path_utils::{cmd_path_arg, file_stem_lossy};
use crate::scratch::ScratchDir;
use crate::tools::{Tool, ToolInvocation, ToolRunner};

mod cover;

/// The tag fields the editor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagField {
    Title,
    Album,
    Artist,
}

impl TagField {
    pub const ALL: [TagField; 3] = [TagField::Title, TagField::Album, TagField::Artist];

    /// Key passed to `-metadata` when writing.
    pub fn key(self) -> &'static str {
        match self {
            TagField::Title => "title",
            TagField::Album => "album",
            TagField::Artist => "artist",
        }
    }

    /// Keys asked from ffprobe; ID3 is normalised to lower case but other
    /// containers keep whatever case the tagger used.
    pub fn probe_keys(self) -> &'static [&'static str] {
        match self {
            TagField::Title => &["title", "TITLE", "Title"],
            TagField::Album => &["album", "ALBUM", "Album"],
            TagField::Artist => &["artist", "ARTIST", "Artist"],
        }
    }

    pub fn value(self, metadata: &Metadata) -> &str {
        match self {
            TagField::Title => &metadata.title,
            TagField::Album => &metadata.album,
            TagField::Artist => &metadata.artist,
        }
    }
}

/// Best-effort reader: nothing it does is reported as an error.
#[derive(Clone)]
pub struct MetadataProbe {
    runner: Arc<dyn ToolRunner>,
    scratch: ScratchDir,
}

impl MetadataProbe {
    pub fn new(runner: Arc<dyn ToolRunner>, scratch: ScratchDir) -> Self {
        Self { runner, scratch }
    }

    /// Reads title/album/artist and the embedded cover of `path`.
    ///
    /// A missing title falls back to the file stem; album and artist fall
    /// back to empty strings.
    pub async fn load(&self, path: &Path) -> LoadedMetadata {
        let (title, album, artist, cover) = futures::join!(
            self.probe_tag(path, TagField::Title),
            self.probe_tag(path, TagField::Album),
            self.probe_tag(path, TagField::Artist),
            cover::extract_cover(self.runner.as_ref(), &self.scratch, path),
        );

        LoadedMetadata {
            metadata: Metadata {
                title: title.unwrap_or_else(|| file_stem_lossy(path)),
                album: album.unwrap_or_default(),
                artist: artist.unwrap_or_default(),
            },
            cover,
        }
    }

    /// One ffprobe call for one field. Any failure reads as "absent".
    pub async fn probe_tag(&self, path: &Path, field: TagField) -> Option<String> {
        let invocation = ToolInvocation::new(Tool::Probe)
            .args(["-v", "error", "-show_entries"])
            .arg(format!("format_tags={}", field.probe_keys().join(",")))
            .args(["-of", "default=nw=1:nk=1"])
            .arg(cmd_path_arg(path));

        let output = match self.runner.run(&invocation).await {
            Ok(output) => output,
            Err(e) => {
                warn!("probing {} of {} failed: {}", field.key(), path.display(), e);
                return None;
            }
        };
        if !output.success {
            debug!(
                "ffprobe {} for {}: {}",
                output.status_label(),
                path.display(),
                output.stderr_lossy()
            );
        }

        first_value_line(&output.stdout_lossy())
    }
}

fn first_value_line(stdout: &str) -> Option<String> {
    let line = stdout.lines().next()?.trim_end_matches('\r');
    if line.trim().is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

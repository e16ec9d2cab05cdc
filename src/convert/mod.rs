use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use crate::error::{EditorError, Result};
use crate::models::{CoverImage, Metadata};
use crate::path_utils::{target_path_for_title, temp_output_path};
use crate::scratch::{ScratchDir, ScratchFile};
use crate::tools::{Tool, ToolRunner};

mod commit;
mod mp3;

/// Rewrites a file with new tags through ffmpeg.
///
/// A save walks `Validating → Converting → Committing`. Only the commit step
/// touches the original file, and it is never reached when validation or the
/// conversion fails.
#[derive(Clone)]
pub struct MetadataWriter {
    runner: Arc<dyn ToolRunner>,
    scratch: ScratchDir,
}

impl MetadataWriter {
    pub fn new(runner: Arc<dyn ToolRunner>, scratch: ScratchDir) -> Self {
        Self { runner, scratch }
    }

    /// Writes `metadata` (and `cover`, if any) into `<dir>/<title>.mp3` and
    /// removes `source`. Returns the new path.
    pub async fn save(
        &self,
        source: &Path,
        metadata: &Metadata,
        cover: Option<&CoverImage>,
    ) -> Result<PathBuf> {
        let target = validate(source, metadata).await?;

        // 同じファイル名のまま保存する場合に備えて別名で書き出す
        let partial = ScratchFile::at(temp_output_path(&target));
        let staged_cover = match cover {
            Some(cover) => Some(self.stage_cover(cover).await?),
            None => None,
        };

        let invocation = mp3::build_invocation(
            source,
            staged_cover.as_ref().map(|f| f.path()),
            metadata,
            partial.path(),
        );
        let output = self.runner.run(&invocation).await?;
        if !output.success {
            return Err(EditorError::ConversionFailed {
                tool: Tool::Convert,
                status: output.status_label(),
                stderr: output.stderr_lossy(),
            });
        }
        match tokio::fs::metadata(partial.path()).await {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                return Err(EditorError::ConversionFailed {
                    tool: Tool::Convert,
                    status: output.status_label(),
                    stderr: format!(
                        "出力ファイルが作成されませんでした: {}",
                        partial.path().display()
                    ),
                })
            }
        }

        commit::replace_original(source, partial.path(), &target).await?;
        info!("saved {} -> {}", source.display(), target.display());
        Ok(target)
    }

    async fn stage_cover(&self, cover: &CoverImage) -> Result<ScratchFile> {
        let staged = self.scratch.reserve("cover", cover.extension()).await?;
        tokio::fs::write(staged.path(), cover.bytes())
            .await
            .map_err(|e| {
                EditorError::io(
                    format!("カバー画像を書き出せませんでした: {}", staged.path().display()),
                    e,
                )
            })?;
        debug!("staged {} byte cover at {}", cover.len(), staged.path().display());
        Ok(staged)
    }
}

/// Checks everything that can be checked without touching the disk contents
/// and returns the destination path.
async fn validate(source: &Path, metadata: &Metadata) -> Result<PathBuf> {
    if !metadata.has_title() {
        return Err(EditorError::MissingTitle);
    }
    let target = target_path_for_title(source, &metadata.title)?;

    let source_real = tokio::fs::canonicalize(source).await.map_err(|e| {
        EditorError::io(
            format!("ファイルが見つかりません: {}", source.display()),
            e,
        )
    })?;
    match tokio::fs::canonicalize(&target).await {
        // 大文字小文字だけ違う名前でも同じファイルなら上書き扱い
        Ok(target_real) if target_real != source_real => {
            Err(EditorError::TargetExists { path: target })
        }
        _ => Ok(target),
    }
}

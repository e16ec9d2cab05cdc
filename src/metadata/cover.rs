use std::path::Path;

use log::{debug, warn};

use crate::models::CoverImage;
use crate::path_utils::cmd_path_arg;
use crate::scratch::ScratchDir;
use crate::tools::{Tool, ToolInvocation, ToolRunner};

/// Copies the first video/image stream of `path` into a scratch file and reads
/// it back. The exit status is ignored: only the output file decides.
pub(super) async fn extract_cover(
    runner: &dyn ToolRunner,
    scratch: &ScratchDir,
    path: &Path,
) -> Option<CoverImage> {
    let target = match scratch.reserve("extracted-cover", "jpg").await {
        Ok(file) => file,
        Err(e) => {
            warn!("cannot prepare cover extraction for {}: {}", path.display(), e);
            return None;
        }
    };

    let invocation = ToolInvocation::new(Tool::Convert)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(cmd_path_arg(path))
        .args(["-an", "-vcodec", "copy", "-frames:v", "1", "-update", "1"])
        .arg(cmd_path_arg(target.path()));

    match runner.run(&invocation).await {
        Ok(output) if !output.success => {
            debug!("no cover in {}: {}", path.display(), output.stderr_lossy());
        }
        Ok(_) => {}
        Err(e) => warn!("cover extraction for {} failed: {}", path.display(), e),
    }

    // target はここで drop され、一時ファイルは消える
    match tokio::fs::read(target.path()).await {
        Ok(bytes) if !bytes.is_empty() => Some(CoverImage::new(bytes)),
        Ok(_) => None,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("cannot read extracted cover {}: {}", target.path().display(), e);
            None
        }
    }
}

use std::path::Path;

use crate::metadata::TagField;
use crate::models::Metadata;
use crate::path_utils::cmd_path_arg;
use crate::tools::{Tool, ToolInvocation};

/// ffmpeg command line that remuxes `source` into `output` with new tags.
///
/// Audio is stream-copied; any existing picture stream is dropped and, when
/// `cover` is given, replaced by that image as the front cover. Tags are
/// written as ID3v2.3.
pub(super) fn build_invocation(
    source: &Path,
    cover: Option<&Path>,
    metadata: &Metadata,
    output: &Path,
) -> ToolInvocation {
    let mut invocation = ToolInvocation::new(Tool::Convert)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(cmd_path_arg(source));

    if let Some(cover) = cover {
        invocation = invocation
            .arg("-i")
            .arg(cmd_path_arg(cover))
            .args(["-map", "0:a", "-map", "1:v", "-c", "copy"])
            .args(["-disposition:v:0", "attached_pic"])
            // APIC の画像種別を front cover にする
            .args(["-metadata:s:v:0", "comment=Cover (front)"]);
    } else {
        invocation = invocation.args(["-map", "0:a", "-c", "copy"]);
    }

    for field in TagField::ALL {
        invocation = invocation
            .arg("-metadata")
            .arg(format!("{}={}", field.key(), field.value(metadata)));
    }

    invocation
        .args(["-id3v2_version", "3", "-f", "mp3"])
        .arg(cmd_path_arg(output))
}

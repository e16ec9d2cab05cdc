use std::path::PathBuf;

use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::tools::Tool;

/// Resolves the configured ffprobe and ffmpeg binaries.
pub fn check_tools(config: &EditorConfig) -> Result<()> {
    // Check for ffprobe
    resolve(Tool::Probe, config)?;
    // Check for ffmpeg
    resolve(Tool::Convert, config)?;
    Ok(())
}

pub fn resolve(tool: Tool, config: &EditorConfig) -> Result<PathBuf> {
    let configured = match tool {
        Tool::Probe => &config.ffprobe_path,
        Tool::Convert => &config.ffmpeg_path,
    };
    which::which(configured).map_err(|_| EditorError::ToolNotFound { tool })
}

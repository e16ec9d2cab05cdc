use std::path::PathBuf;
use std::time::Duration;

use log::warn;

const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;

/// Runtime settings for the tools and the scratch area.
///
/// Every field can be overridden from the environment, see [`EditorConfig::from_env`].
#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub ffprobe_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    /// Process-wide directory for cover extraction and cover staging files.
    pub scratch_dir: PathBuf,
    /// `None` waits for the tool forever.
    pub tool_timeout: Option<Duration>,
    /// Upper bound for [`crate::processing::Editor::load_many`].
    pub probe_concurrency: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: PathBuf::from("ffprobe"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            scratch_dir: default_scratch_dir(),
            tool_timeout: Some(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS)),
            probe_concurrency: default_probe_concurrency(),
        }
    }
}

impl EditorConfig {
    /// Defaults overridden by `MTE_FFPROBE`, `MTE_FFMPEG`, `MTE_SCRATCH_DIR`,
    /// `MTE_TOOL_TIMEOUT_SECS` (0 disables the timeout) and
    /// `MTE_PROBE_CONCURRENCY` (clamped to 1..=64).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty("MTE_FFPROBE") {
            config.ffprobe_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty("MTE_FFMPEG") {
            config.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(dir) = non_empty("MTE_SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(dir);
        }
        if let Some(raw) = non_empty("MTE_TOOL_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.tool_timeout = None,
                Ok(secs) => config.tool_timeout = Some(Duration::from_secs(secs)),
                Err(_) => warn!("ignoring MTE_TOOL_TIMEOUT_SECS={:?}", raw),
            }
        }
        if let Some(raw) = non_empty("MTE_PROBE_CONCURRENCY") {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.probe_concurrency = n.clamp(1, 64),
                Err(_) => warn!("ignoring MTE_PROBE_CONCURRENCY={:?}", raw),
            }
        }

        config
    }
}

fn default_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("mp3tageditor")
        .join("scratch")
}

fn default_probe_concurrency() -> usize {
    // CPUコア数をベースに 2〜8 の範囲
    let cpu_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    std::cmp::min(8, std::cmp::max(2, cpu_cores))
}

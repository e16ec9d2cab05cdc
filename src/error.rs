use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::tools::Tool;

/// Errors surfaced by the save path, the session layer and the tool runner.
///
/// Probing never returns these to its caller; a failed probe only means the
/// field (or cover) is absent.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("タイトルが入力されていません")]
    MissingTitle,

    #[error("タイトル {title:?} からファイル名を作れません")]
    InvalidTitle { title: String },

    #[error("保存先ファイルが既に存在します: {}", .path.display())]
    TargetExists { path: PathBuf },

    #[error("{tool}の変換に失敗しました ({status}): {stderr}")]
    ConversionFailed {
        tool: Tool,
        status: String,
        stderr: String,
    },

    #[error("{tool}が見つかりません")]
    ToolNotFound { tool: Tool },

    #[error("{tool}が{after:?}以内に終了しませんでした")]
    TimedOut { tool: Tool, after: Duration },

    #[error("このファイルは処理中です")]
    Busy,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("バックグラウンド処理が応答なしで終了しました")]
    WorkerLost,
}

impl EditorError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        EditorError::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether retrying the same request later can succeed without user input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EditorError::Busy | EditorError::TimedOut { .. })
    }
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;

use std::path::Path;

use log::{error, warn};

use crate::error::{EditorError, Result};
use crate::path_utils::backup_path;

/// Puts `converted` at `target` and retires `source`.
///
/// The original is first parked under a hidden backup name, so at every point
/// either the original or the new file exists under a real name. If moving the
/// new file into place fails the backup goes back to `source`.
pub(super) async fn replace_original(source: &Path, converted: &Path, target: &Path) -> Result<()> {
    let backup = backup_path(source);

    tokio::fs::rename(source, &backup).await.map_err(|e| {
        EditorError::io(
            format!("元ファイルを退避できませんでした: {}", source.display()),
            e,
        )
    })?;

    if let Err(e) = tokio::fs::rename(converted, target).await {
        if let Err(restore) = tokio::fs::rename(&backup, source).await {
            error!(
                "could not restore {} from {}: {}",
                source.display(),
                backup.display(),
                restore
            );
            return Err(EditorError::io(
                format!(
                    "保存に失敗し、元ファイルは {} に残っています",
                    backup.display()
                ),
                e,
            ));
        }
        return Err(EditorError::io(
            format!("保存先に移動できませんでした: {}", target.display()),
            e,
        ));
    }

    if let Err(e) = tokio::fs::remove_file(&backup).await {
        warn!("could not remove backup {}: {}", backup.display(), e);
    }
    Ok(())
}

use std::path::{Path, PathBuf};

use log::warn;
use uuid::Uuid;

use crate::error::{EditorError, Result};

/// Process-wide directory for short-lived tool inputs and outputs.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates the directory if missing and reserves a unique file name in it.
    ///
    /// Nothing is written; the returned guard removes whatever ends up at the
    /// path when it is dropped.
    pub async fn reserve(&self, prefix: &str, extension: &str) -> Result<ScratchFile> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            EditorError::io(
                format!("作業フォルダを作成できませんでした: {}", self.root.display()),
                e,
            )
        })?;
        let name = format!("{}-{}.{}", prefix, Uuid::new_v4(), extension);
        Ok(ScratchFile {
            path: self.root.join(name),
        })
    }
}

/// A file path inside the scratch directory that is deleted on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Guards a path outside the scratch directory, e.g. a partial output
    /// written next to its final destination.
    pub(crate) fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove scratch file {}: {}", self.path.display(), e),
        }
    }
}

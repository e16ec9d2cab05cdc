use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, Weak};

use futures::{stream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{oneshot, Mutex};

use crate::config::EditorConfig;
use crate::convert::MetadataWriter;
use crate::error::{EditorError, Result};
use crate::metadata::MetadataProbe;
use crate::models::{AudioAsset, AudioFileResult, CoverImage, Metadata};
use crate::scratch::ScratchDir;
use crate::system_check;
use crate::tools::{ProcessRunner, ToolRunner};

/// Entry point for callers: owns the probe and writer and runs their work in
/// background tasks.
///
/// Submissions must happen inside a tokio runtime.
#[derive(Clone)]
pub struct Editor {
    config: Arc<EditorConfig>,
    probe: MetadataProbe,
    writer: MetadataWriter,
    slots: SlotRegistry,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let runner = Arc::new(ProcessRunner::new(&config));
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: EditorConfig, runner: Arc<dyn ToolRunner>) -> Self {
        let scratch = ScratchDir::new(config.scratch_dir.clone());
        Self {
            probe: MetadataProbe::new(runner.clone(), scratch.clone()),
            writer: MetadataWriter::new(runner, scratch),
            config: Arc::new(config),
            slots: SlotRegistry::default(),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn probe(&self) -> &MetadataProbe {
        &self.probe
    }

    pub fn writer(&self) -> &MetadataWriter {
        &self.writer
    }

    /// Fails with `ToolNotFound` when ffprobe or ffmpeg cannot be resolved.
    pub fn check_tools(&self) -> Result<()> {
        system_check::check_tools(&self.config)
    }

    /// A selected file. Nothing is read until [`Editor::submit_load`].
    ///
    /// Handles opened on the same file share one asset and one busy flag as
    /// long as any of them is alive.
    pub fn open(&self, path: impl Into<PathBuf>) -> AssetHandle {
        AssetHandle {
            slot: self.slots.get_or_insert(path.into()),
        }
    }

    /// Probes the asset's file in the background and stores the result in it.
    pub fn submit_load(&self, handle: &AssetHandle) -> Result<Completion<AudioAsset>> {
        let guard = BusyGuard::acquire(&handle.slot)?;
        let probe = self.probe.clone();
        let slot = handle.slot.clone();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let path = slot.asset.lock().await.path.clone();
            let loaded = probe.load(&path).await;
            let snapshot = {
                let mut asset = slot.asset.lock().await;
                asset.apply_loaded(loaded);
                asset.clone()
            };
            drop(guard);
            let _ = tx.send(Ok(snapshot));
        });

        Ok(Completion { rx })
    }

    /// Stores the edits in the asset and saves them in the background.
    ///
    /// On success the asset points at the new file. On failure it keeps the
    /// edits and its old path.
    pub fn submit_save(
        &self,
        handle: &AssetHandle,
        metadata: Metadata,
        cover: Option<CoverImage>,
    ) -> Result<Completion<PathBuf>> {
        if !metadata.has_title() {
            return Err(EditorError::MissingTitle);
        }
        let guard = BusyGuard::acquire(&handle.slot)?;
        let writer = self.writer.clone();
        let slots = self.slots.clone();
        let slot = handle.slot.clone();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let source = {
                let mut asset = slot.asset.lock().await;
                asset.set_metadata(metadata.clone(), cover.clone());
                asset.path.clone()
            };
            let result = writer.save(&source, &metadata, cover.as_ref()).await;
            if let Ok(saved) = &result {
                slot.asset.lock().await.path = saved.clone();
                slots.rename(&slot, saved);
            }
            drop(guard);
            let _ = tx.send(result);
        });

        Ok(Completion { rx })
    }

    /// Probes many files, at most `probe_concurrency` at a time. Results keep
    /// the input order. Files with a load or save in flight get an error entry.
    pub async fn load_many(&self, paths: Vec<PathBuf>) -> Vec<AudioFileResult> {
        let total = paths.len();
        let finished = Arc::new(AtomicUsize::new(0));

        stream::iter(paths)
            .map(|file_path| {
                let probe = self.probe.clone();
                let slots = self.slots.clone();
                let finished = finished.clone();
                async move {
                    let result = if tokio::fs::metadata(&file_path).await.is_err() {
                        warn!("skipping missing file {}", file_path.display());
                        AudioFileResult {
                            file_path,
                            loaded: None,
                            error: Some("ファイルが見つかりません".to_string()),
                        }
                    } else {
                        let slot = slots.get_or_insert(file_path.clone());
                        match BusyGuard::acquire(&slot) {
                            Ok(_guard) => {
                                let loaded = probe.load(&file_path).await;
                                AudioFileResult {
                                    file_path,
                                    loaded: Some(loaded),
                                    error: None,
                                }
                            }
                            Err(e) => {
                                warn!("skipping busy file {}", file_path.display());
                                AudioFileResult {
                                    file_path,
                                    loaded: None,
                                    error: Some(e.to_string()),
                                }
                            }
                        }
                    };
                    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!("probed {}/{}: {}", done, total, result.file_path.display());
                    result
                }
            })
            .buffered(self.config.probe_concurrency.max(1))
            .collect()
            .await
    }
}

struct AssetSlot {
    asset: Mutex<AudioAsset>,
    busy: AtomicBool,
}

/// Live slots by canonical path. Only weak references are kept, so a slot
/// goes away with its last handle.
#[derive(Clone, Default)]
struct SlotRegistry {
    slots: Arc<std::sync::Mutex<HashMap<PathBuf, Weak<AssetSlot>>>>,
}

impl SlotRegistry {
    fn get_or_insert(&self, path: PathBuf) -> Arc<AssetSlot> {
        let key = registry_key(&path);
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(&key).and_then(Weak::upgrade) {
            return slot;
        }
        slots.retain(|_, slot| slot.strong_count() > 0);
        let slot = Arc::new(AssetSlot {
            asset: Mutex::new(AudioAsset::new(path)),
            busy: AtomicBool::new(false),
        });
        slots.insert(key, Arc::downgrade(&slot));
        slot
    }

    /// Re-registers `slot` under the path its file was saved to.
    fn rename(&self, slot: &Arc<AssetSlot>, saved: &Path) {
        let own = Arc::downgrade(slot);
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, weak| weak.strong_count() > 0 && !Weak::ptr_eq(weak, &own));
        slots.insert(registry_key(saved), own);
    }
}

// 存在しないパスはそのままキーにする
fn registry_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Shared handle to one asset; clones refer to the same asset and busy flag.
#[derive(Clone)]
pub struct AssetHandle {
    slot: Arc<AssetSlot>,
}

impl AssetHandle {
    pub async fn snapshot(&self) -> AudioAsset {
        self.slot.asset.lock().await.clone()
    }

    pub async fn path(&self) -> PathBuf {
        self.slot.asset.lock().await.path.clone()
    }

    /// Whether a load or save is in flight.
    pub fn is_busy(&self) -> bool {
        self.slot.busy.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetHandle")
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

struct BusyGuard {
    slot: Arc<AssetSlot>,
}

impl BusyGuard {
    fn acquire(slot: &Arc<AssetSlot>) -> Result<Self> {
        slot.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EditorError::Busy)?;
        Ok(Self { slot: slot.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

/// Outcome of a submitted load or save.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Completion<T> {
    pub async fn wait(self) -> Result<T> {
        self.rx.await.map_err(|_| EditorError::WorkerLost)?
    }

    /// Non-blocking check for event loops that poll; `None` while running.
    pub fn try_result(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(EditorError::WorkerLost)),
        }
    }
}

/// Loads, edits and saves one file in a single call.
pub async fn edit_file(
    editor: &Editor,
    path: &Path,
    edit: impl FnOnce(&mut Metadata, &mut Option<CoverImage>),
) -> Result<PathBuf> {
    let handle = editor.open(path);
    let mut asset = editor.submit_load(&handle)?.wait().await?;
    edit(&mut asset.metadata, &mut asset.cover);
    let saved = editor
        .submit_save(&handle, asset.metadata, asset.cover)?
        .wait()
        .await?;
    info!("updated tags of {}", saved.display());
    Ok(saved)
}

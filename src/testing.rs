//! In-process stand-ins for ffprobe/ffmpeg.
//!
//! "Media files" are JSON documents `{"tags": {..}, "cover": "<base64>"}`.
//! The fake tools understand exactly the command lines this crate builds.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::prelude::*;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;

use crate::error::{EditorError, Result};
use crate::tools::{Tool, ToolInvocation, ToolOutput, ToolRunner};

pub(crate) fn write_media(path: &Path, tags: &[(&str, &str)], cover: Option<&[u8]>) {
    let tags: Map<String, Value> = tags
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    let doc = json!({
        "tags": tags,
        "cover": cover.map(|c| BASE64_STANDARD.encode(c)),
    });
    std::fs::write(path, serde_json::to_vec(&doc).unwrap()).unwrap();
}

pub(crate) struct Media {
    pub tags: Map<String, Value>,
    pub cover: Option<Vec<u8>>,
}

impl Media {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).and_then(|v| v.as_str())
    }
}

pub(crate) fn read_media(path: &Path) -> Option<Media> {
    let raw = std::fs::read(path).ok()?;
    let doc: Value = serde_json::from_slice(&raw).ok()?;
    let tags = doc.get("tags")?.as_object()?.clone();
    let cover = doc
        .get("cover")
        .and_then(|c| c.as_str())
        .and_then(|c| BASE64_STANDARD.decode(c).ok());
    Some(Media { tags, cover })
}

#[derive(Default)]
pub(crate) struct FakeTools {
    missing: Mutex<HashSet<Tool>>,
    convert_failure: Mutex<Option<String>>,
    calls: Mutex<Vec<(Tool, Vec<String>)>>,
    /// When set, every save-style ffmpeg call waits for a permit first.
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeTools {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_missing(&self, tool: Tool) {
        self.missing.lock().unwrap().insert(tool);
    }

    /// Save-style ffmpeg calls leave a partial file behind and exit 1.
    pub fn fail_conversions(&self, stderr: &str) {
        *self.convert_failure.lock().unwrap() = Some(stderr.to_string());
    }

    pub fn gate_conversions(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn invocations(&self, tool: Tool) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == tool)
            .map(|(_, args)| args.clone())
            .collect()
    }

    fn probe(&self, args: &[String]) -> ToolOutput {
        let keys = args
            .iter()
            .find_map(|a| a.strip_prefix("format_tags="))
            .unwrap_or_default();
        let path = PathBuf::from(args.last().cloned().unwrap_or_default());
        let Some(media) = read_media(&path) else {
            return failed("Invalid data found when processing input");
        };
        let stdout: String = keys
            .split(',')
            .filter_map(|k| media.tag(k))
            .map(|v| format!("{}\n", v))
            .collect();
        ToolOutput {
            success: true,
            code: Some(0),
            stdout: stdout.into_bytes(),
            stderr: Vec::new(),
        }
    }

    async fn convert(&self, args: &[String]) -> ToolOutput {
        let inputs: Vec<PathBuf> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| PathBuf::from(&w[1]))
            .collect();
        let output = PathBuf::from(args.last().cloned().unwrap_or_default());
        let Some(source) = inputs.first().and_then(|p| read_media(p)) else {
            return failed("Invalid data found when processing input");
        };

        if args.iter().any(|a| a == "-an") {
            return match source.cover {
                Some(bytes) => {
                    std::fs::write(&output, bytes).unwrap();
                    ok()
                }
                None => failed("Output file does not contain any stream"),
            };
        }

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let failure = self.convert_failure.lock().unwrap().clone();
        if let Some(stderr) = failure {
            std::fs::write(&output, b"partial").unwrap();
            return failed(&stderr);
        }

        let maps: Vec<&str> = args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].as_str())
            .collect();
        let cover = if maps.contains(&"1:v") {
            match inputs.get(1).map(std::fs::read) {
                Some(Ok(bytes)) => Some(bytes),
                _ => return failed("cover input missing"),
            }
        } else {
            None
        };

        let mut tags = source.tags.clone();
        for w in args.windows(2).filter(|w| w[0] == "-metadata") {
            if let Some((k, v)) = w[1].split_once('=') {
                tags.insert(k.to_string(), Value::String(v.to_string()));
            }
        }
        let doc = json!({
            "tags": tags,
            "cover": cover.map(|c| BASE64_STANDARD.encode(c)),
        });
        std::fs::write(&output, serde_json::to_vec(&doc).unwrap()).unwrap();
        ok()
    }
}

impl ToolRunner for FakeTools {
    fn run<'a>(&'a self, invocation: &'a ToolInvocation) -> BoxFuture<'a, Result<ToolOutput>> {
        async move {
            let args = invocation.args_lossy();
            self.calls
                .lock()
                .unwrap()
                .push((invocation.tool, args.clone()));
            if self.missing.lock().unwrap().contains(&invocation.tool) {
                return Err(EditorError::ToolNotFound {
                    tool: invocation.tool,
                });
            }
            Ok(match invocation.tool {
                Tool::Probe => self.probe(&args),
                Tool::Convert => self.convert(&args).await,
            })
        }
        .boxed()
    }
}

fn ok() -> ToolOutput {
    ToolOutput {
        success: true,
        code: Some(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

fn failed(stderr: &str) -> ToolOutput {
    ToolOutput {
        success: false,
        code: Some(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

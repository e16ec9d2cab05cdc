use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use tokio::process::Command;

use crate::config::EditorConfig;
use crate::error::{EditorError, Result};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// The two external collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// ffprobe
    Probe,
    /// ffmpeg
    Convert,
}

impl Tool {
    pub fn binary_name(self) -> &'static str {
        match self {
            Tool::Probe => "ffprobe",
            Tool::Convert => "ffmpeg",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// One command line for one tool.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Lossy rendering for logs and tests.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    pub fn status_label(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Seam between the orchestration code and the actual subprocesses.
///
/// `Err` is reserved for "the tool could not be run to completion" (missing
/// binary, timeout, pipe failure). A tool that ran and exited nonzero is an
/// `Ok` with `success == false`; callers decide what that means.
pub trait ToolRunner: Send + Sync {
    fn run<'a>(&'a self, invocation: &'a ToolInvocation) -> BoxFuture<'a, Result<ToolOutput>>;
}

/// Runs the real binaries with `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            ffprobe: config.ffprobe_path.clone(),
            ffmpeg: config.ffmpeg_path.clone(),
            timeout: config.tool_timeout,
        }
    }

    fn program(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Probe => &self.ffprobe,
            Tool::Convert => &self.ffmpeg,
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn run<'a>(&'a self, invocation: &'a ToolInvocation) -> BoxFuture<'a, Result<ToolOutput>> {
        async move {
            execute(
                invocation.tool,
                self.program(invocation.tool),
                &invocation.args,
                self.timeout,
            )
            .await
        }
        .boxed()
    }
}

pub(crate) async fn execute(
    tool: Tool,
    program: &Path,
    args: &[OsString],
    timeout: Option<Duration>,
) -> Result<ToolOutput> {
    debug!(
        "running {} {}",
        program.display(),
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let mut cmd = Command::new(program);
    #[cfg(windows)]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // タイムアウトで future を捨てたときに子プロセスも止める
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EditorError::ToolNotFound { tool }
        } else {
            EditorError::io(format!("{}の実行に失敗しました", tool), e)
        }
    })?;

    let waiting = child.wait_with_output();
    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, waiting)
            .await
            .map_err(|_| EditorError::TimedOut { tool, after: limit })?,
        None => waiting.await,
    }
    .map_err(|e| EditorError::io(format!("{}の出力を読み取れませんでした", tool), e))?;

    Ok(ToolOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

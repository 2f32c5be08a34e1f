use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::FetchError;

/// External programs this crate drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    YtDlp,
    Ffmpeg,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::YtDlp => "yt-dlp",
            Tool::Ffmpeg => "ffmpeg",
        }
    }
}

/// Where to find yt-dlp and ffmpeg, and how long to let them run
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ytdlp: String,
    pub ffmpeg: String,
    pub timeout: Duration,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            ytdlp: Tool::YtDlp.as_str().to_string(),
            ffmpeg: Tool::Ffmpeg.as_str().to_string(),
            timeout: Duration::from_secs(600),
        }
    }
}

impl Toolchain {
    fn program(&self, tool: Tool) -> &str {
        match tool {
            Tool::YtDlp => &self.ytdlp,
            Tool::Ffmpeg => &self.ffmpeg,
        }
    }

    /// Resolve a tool to an executable path, if it is installed.
    pub fn locate(&self, tool: Tool) -> Option<PathBuf> {
        which::which(self.program(tool)).ok()
    }

    pub fn ffmpeg_available(&self) -> bool {
        self.locate(Tool::Ffmpeg).is_some()
    }

    /// Run a tool to completion and return its output.
    ///
    /// A non-zero exit becomes [`FetchError::ToolFailed`] carrying stderr.
    pub async fn run(&self, tool: Tool, args: &[String]) -> Result<Output, FetchError> {
        let program = self.program(tool);
        debug!("Running {} {:?}", program, args);

        let child = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, child)
            .await
            .map_err(|_| FetchError::TimedOut {
                tool: tool.as_str().to_string(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    FetchError::ToolMissing(tool.as_str().to_string())
                } else {
                    FetchError::ToolFailed {
                        tool: tool.as_str().to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} exited with {}: {}", tool.as_str(), output.status, stderr.trim());
            return Err(FetchError::ToolFailed {
                tool: tool.as_str().to_string(),
                message: stderr.into_owned(),
            });
        }

        Ok(output)
    }
}

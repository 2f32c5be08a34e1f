use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::tools::Toolchain;

/// External tool locations, shared by every subcommand
#[derive(Debug, Clone, Args)]
pub struct ToolArgs {
    /// yt-dlp executable (name on PATH or absolute path)
    #[arg(long = "yt-dlp", env = "YTDLP_BIN", default_value = "yt-dlp", global = true)]
    pub ytdlp: String,

    /// ffmpeg executable (name on PATH or absolute path)
    #[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg", global = true)]
    pub ffmpeg: String,

    /// Seconds a single yt-dlp/ffmpeg run may take
    #[arg(long, env = "CLIPGRAB_TOOL_TIMEOUT", default_value_t = 600, global = true)]
    pub tool_timeout: u64,
}

impl ToolArgs {
    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            ytdlp: self.ytdlp.clone(),
            ffmpeg: self.ffmpeg.clone(),
            timeout: Duration::from_secs(self.tool_timeout),
        }
    }
}

/// Web form settings
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "CLIPGRAB_ADDR", default_value = "127.0.0.1:5000", global = true)]
    pub addr: SocketAddr,

    /// Directory holding per-request download folders
    #[arg(long, env = "CLIPGRAB_DOWNLOAD_DIR", default_value = "downloads", global = true)]
    pub download_dir: PathBuf,

    /// Seconds an unclaimed download is kept before it is swept
    #[arg(long, env = "CLIPGRAB_RETENTION", default_value_t = 1200, global = true)]
    pub retention: u64,
}

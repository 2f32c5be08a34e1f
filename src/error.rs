use thiserror::Error;

/// Message shown when a merge or conversion needs ffmpeg and the tool reported it missing.
pub const FFMPEG_REQUIRED: &str =
    "FFmpeg is required for this quality. Please install FFmpeg or choose a different quality option.";

/// Message shown when a preset needing ffmpeg is requested while ffmpeg is absent.
pub const FFMPEG_NOT_INSTALLED: &str =
    "FFmpeg is not installed. Please install FFmpeg or use \"Best Available (Single File)\" option.";

/// Failures of the external extractor / media tools
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} is not installed or not on PATH")]
    ToolMissing(String),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{tool} did not finish within {seconds}s")]
    TimedOut { tool: String, seconds: u64 },

    /// Rejected input; carries the message shown to the user
    #[error("{0}")]
    InvalidUrl(String),

    #[error("Downloaded file not found")]
    NoOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message for a URL that cannot be downloaded from.
pub const INVALID_URL: &str = "Invalid URL";

impl FetchError {
    /// One-line description keeping the tool name, for logs and notes.
    pub fn brief(&self) -> String {
        match self {
            Self::ToolFailed { tool, message } => format!("{tool} failed: {}", last_line(message)),
            other => other.to_string(),
        }
    }

    /// Text suitable for showing to the person who submitted the request.
    pub fn user_message(&self) -> String {
        match self {
            Self::ToolMissing(tool) if tool.to_ascii_lowercase().contains("ffmpeg") => {
                FFMPEG_REQUIRED.to_string()
            }
            Self::ToolFailed { message, .. } => friendly_message(message),
            other => other.to_string(),
        }
    }
}

/// Rewrite raw tool stderr into a short message.
///
/// Only the last non-empty line is kept; well-known failures get a fixed hint.
pub fn friendly_message(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();

    if lower.contains("ffmpeg") {
        return FFMPEG_REQUIRED.to_string();
    }
    if lower.contains("unsupported url") {
        return "Unsupported or invalid URL.".to_string();
    }

    last_line(raw).to_string()
}

fn last_line(raw: &str) -> &str {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("Download failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmpeg_mentions_become_install_hint() {
        let raw = "ERROR: You have requested merging of multiple formats but ffmpeg is not installed. Aborting due to --abort-on-error";
        assert_eq!(friendly_message(raw), FFMPEG_REQUIRED);

        let raw = "ERROR: Postprocessing: FFMPEG not found";
        assert_eq!(friendly_message(raw), FFMPEG_REQUIRED);
    }

    #[test]
    fn unsupported_url_is_rewritten() {
        let raw = "ERROR: Unsupported URL: https://example.com/nothing";
        assert_eq!(friendly_message(raw), "Unsupported or invalid URL.");
    }

    #[test]
    fn keeps_last_line_otherwise() {
        let raw = "WARNING: something\n\nERROR: [youtube] abc: Video unavailable\n  \n";
        assert_eq!(friendly_message(raw), "ERROR: [youtube] abc: Video unavailable");
        assert_eq!(friendly_message("   "), "Download failed");
    }

    #[test]
    fn missing_ffmpeg_tool_maps_to_hint() {
        let err = FetchError::ToolMissing("ffmpeg".into());
        assert_eq!(err.user_message(), FFMPEG_REQUIRED);

        let err = FetchError::ToolMissing("yt-dlp".into());
        assert_eq!(err.user_message(), "yt-dlp is not installed or not on PATH");
    }

    #[test]
    fn brief_keeps_tool_and_last_line() {
        let err = FetchError::ToolFailed {
            tool: "ffmpeg".into(),
            message: "ffmpeg version 6.1\nConversion failed!\n".into(),
        };
        assert_eq!(err.brief(), "ffmpeg failed: Conversion failed!");
        assert_eq!(FetchError::NoOutput.brief(), "Downloaded file not found");
    }
}

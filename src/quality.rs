use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality presets offered by the web form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "single_best")]
    SingleBest,
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "audio")]
    Audio,
}

/// Bitrate used when the audio preset re-encodes to mp3
pub const MP3_QUALITY: &str = "192K";

impl Quality {
    /// Every preset, in the order the form lists them.
    pub const ALL: [Quality; 7] = [
        Quality::SingleBest,
        Quality::Best,
        Quality::P1080,
        Quality::P720,
        Quality::P480,
        Quality::P360,
        Quality::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::SingleBest => "single_best",
            Quality::Best => "best",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
            Quality::Audio => "audio",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quality::SingleBest => "Best Available (Single File) - No FFmpeg Required",
            Quality::Best => "Best Quality (Video + Audio) - Requires FFmpeg",
            Quality::P1080 => "1080p (Full HD) - Requires FFmpeg",
            Quality::P720 => "720p (HD) - Requires FFmpeg",
            Quality::P480 => "480p (SD)",
            Quality::P360 => "360p (Low)",
            Quality::Audio => "Audio Only (MP3) - Requires FFmpeg",
        }
    }

    /// yt-dlp `--format` selector for this preset
    pub fn format_selector(&self) -> &'static str {
        match self {
            Quality::SingleBest => "best[ext=mp4]/best",
            Quality::Best => "bestvideo+bestaudio/best",
            Quality::P1080 => "bestvideo[height<=1080]+bestaudio/best[height<=1080]",
            Quality::P720 => "bestvideo[height<=720]+bestaudio/best[height<=720]",
            Quality::P480 => "best[height<=480]/best",
            Quality::P360 => "best[height<=360]/best",
            Quality::Audio => "bestaudio/best",
        }
    }

    /// Container requested for merged adaptive downloads
    pub fn merge_output_format(&self) -> Option<&'static str> {
        match self {
            Quality::Best | Quality::P1080 | Quality::P720 => Some("mp4"),
            _ => None,
        }
    }

    pub fn extracts_audio(&self) -> bool {
        matches!(self, Quality::Audio)
    }

    pub fn requires_ffmpeg(&self) -> bool {
        self.merge_output_format().is_some() || self.extracts_audio()
    }

    /// Full yt-dlp argument fragment selecting and post-processing this preset.
    pub fn ytdlp_args(&self) -> Vec<String> {
        let mut args = vec!["--format".to_string(), self.format_selector().to_string()];

        if let Some(container) = self.merge_output_format() {
            args.push("--merge-output-format".to_string());
            args.push(container.to_string());
        }
        if self.extracts_audio() {
            args.extend(
                ["--extract-audio", "--audio-format", "mp3", "--audio-quality", MP3_QUALITY]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }

        args
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown quality: {0}")]
pub struct UnknownQuality(pub String);

impl FromStr for Quality {
    type Err = UnknownQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Quality::ALL
            .iter()
            .copied()
            .find(|q| q.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownQuality(wanted.to_string()))
    }
}

//! Stream catalogue for the dashboard: metadata and the list of downloadable
//! variants of one video, as reported by `yt-dlp -J`.

use std::cmp::Ordering;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::FetchError;
use crate::tools::{Tool, Toolchain};

fn video_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:v=|v/|embed/|youtu\.be/)([A-Za-z0-9_-]{6,})").expect("valid video id regex")
    })
}

fn filename_cleanup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9a-zA-Z\-_\. ]+").expect("valid filename regex"))
}

/// Pull the video id out of a watch, embed or short link.
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_re()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn canonical_watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Strip a title down to characters safe in a filename.
pub fn safe_filename(name: &str) -> String {
    filename_cleanup_re().replace_all(name, "").trim().to_string()
}

/// Byte count in binary units, e.g. `12.3MB`
pub fn human_size(bytes: Option<u64>) -> String {
    let Some(bytes) = bytes.filter(|b| *b > 0) else {
        return "Unknown".to_string();
    };

    let mut num = bytes as f64;
    for unit in ["", "K", "M", "G", "T"] {
        if num.abs() < 1024.0 {
            return format!("{num:.1}{unit}B");
        }
        num /= 1024.0;
    }
    format!("{num:.1}PB")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamKind {
    /// Audio and video in one file
    Progressive,
    VideoOnly,
    AudioOnly,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Progressive => "progressive",
            StreamKind::VideoOnly => "video-only",
            StreamKind::AudioOnly => "audio-only",
        }
    }
}

/// One format entry from yt-dlp's JSON dump
#[derive(Debug, Clone, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub abr: Option<f64>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    pub protocol: Option<String>,
}

impl RawFormat {
    fn has_video(&self) -> bool {
        matches!(self.vcodec.as_deref(), Some(v) if v != "none" && !v.is_empty())
    }

    fn has_audio(&self) -> bool {
        matches!(self.acodec.as_deref(), Some(a) if a != "none" && !a.is_empty())
    }

    fn kind(&self) -> Option<StreamKind> {
        match (self.has_video(), self.has_audio()) {
            (true, true) => Some(StreamKind::Progressive),
            (true, false) => Some(StreamKind::VideoOnly),
            (false, true) => Some(StreamKind::AudioOnly),
            (false, false) => None,
        }
    }

    fn mime_type(&self, kind: StreamKind) -> String {
        let ext = self.ext.as_deref().unwrap_or("unknown");
        let major = if kind == StreamKind::AudioOnly { "audio" } else { "video" };
        let sub = match ext {
            "m4a" => "mp4",
            other => other,
        };
        format!("{major}/{sub}")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    description: Option<String>,
    thumbnail: Option<String>,
    upload_date: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// A downloadable variant, ready to list
#[derive(Debug, Clone, Serialize)]
pub struct StreamVariant {
    pub format_id: String,
    pub kind: StreamKind,
    pub ext: String,
    pub mime_type: String,
    pub height: Option<u32>,
    pub abr: Option<f64>,
    pub filesize: Option<u64>,
    pub label: String,
}

impl StreamVariant {
    fn from_raw(raw: &RawFormat) -> Option<Self> {
        let kind = raw.kind()?;
        let filesize = raw.filesize.or(raw.filesize_approx);
        let mime_type = raw.mime_type(kind);
        let size = human_size(filesize);

        let label = match kind {
            StreamKind::AudioOnly => {
                let abr = raw
                    .abr
                    .map(|a| format!("{}kbps", a.round() as u64))
                    .unwrap_or_else(|| "?".to_string());
                format!("Audio: {abr} — audio-only — {mime_type} — {size}")
            }
            _ => {
                let res = raw
                    .height
                    .map(|h| format!("{h}p"))
                    .unwrap_or_else(|| "?".to_string());
                format!("{res} — {} — {mime_type} — {size}", kind.as_str())
            }
        };

        Some(Self {
            format_id: raw.format_id.clone(),
            kind,
            ext: raw.ext.clone().unwrap_or_else(|| "bin".to_string()),
            mime_type,
            height: raw.height,
            abr: raw.abr,
            filesize,
            label,
        })
    }
}

/// Metadata plus every variant for one video
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub id: Option<String>,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub duration_seconds: Option<u64>,
    pub views: Option<u64>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub upload_date: Option<NaiveDate>,
    pub variants: Vec<StreamVariant>,
}

impl Catalog {
    /// Parse a `yt-dlp -J` dump.
    ///
    /// Variants come grouped progressive, video-only, audio-only; video groups
    /// by height descending and audio by bitrate descending.
    pub fn from_json(url: &str, json: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawInfo = serde_json::from_slice(json)?;

        let all: Vec<StreamVariant> = raw
            .formats
            .iter()
            // storyboards and manifests are not downloadable variants
            .filter(|f| f.protocol.as_deref() != Some("mhtml"))
            .filter_map(StreamVariant::from_raw)
            .collect();

        let mut variants = Vec::with_capacity(all.len());
        for kind in [StreamKind::Progressive, StreamKind::VideoOnly, StreamKind::AudioOnly] {
            let mut group: Vec<StreamVariant> =
                all.iter().filter(|v| v.kind == kind).cloned().collect();
            if kind == StreamKind::AudioOnly {
                group.sort_by(|a, b| cmp_desc(a.abr, b.abr));
            } else {
                group.sort_by(|a, b| b.height.cmp(&a.height));
            }
            variants.extend(group);
        }

        let upload_date = raw
            .upload_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok());

        Ok(Self {
            id: raw.id,
            url: raw.webpage_url.unwrap_or_else(|| url.to_string()),
            title: raw
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "untitled".to_string()),
            author: raw.uploader.or(raw.channel),
            duration_seconds: raw.duration.map(|d| d.round() as u64),
            views: raw.view_count,
            description: raw.description,
            thumbnail: raw.thumbnail,
            upload_date,
            variants,
        })
    }

    /// Highest-bitrate audio-only variant
    pub fn best_audio(&self) -> Option<&StreamVariant> {
        self.variants
            .iter()
            .filter(|v| v.kind == StreamKind::AudioOnly)
            .max_by(|a, b| cmp_desc(b.abr, a.abr))
    }
}

fn cmp_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    b.unwrap_or(0.0)
        .partial_cmp(&a.unwrap_or(0.0))
        .unwrap_or(Ordering::Equal)
}

/// Resolve `url` to a canonical watch URL and fetch its catalogue.
pub async fn fetch_catalog(tools: &Toolchain, url: &str) -> Result<Catalog, FetchError> {
    let video_id = extract_video_id(url).ok_or_else(|| {
        FetchError::InvalidUrl(
            "Invalid YouTube URL — couldn't find a video id. Try a full watch URL: https://www.youtube.com/watch?v=... or a youtu.be short link.".to_string(),
        )
    })?;
    let canonical = canonical_watch_url(&video_id);

    info!("Fetching stream list for {}", canonical);

    let args: Vec<String> = ["-J", "--no-playlist", "--no-warnings", canonical.as_str()]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let output = tools.run(Tool::YtDlp, &args).await?;

    let catalog = Catalog::from_json(&canonical, &output.stdout).map_err(|e| FetchError::ToolFailed {
        tool: Tool::YtDlp.as_str().to_string(),
        message: format!("unreadable metadata: {e}"),
    })?;

    info!(
        "Fetched metadata for: {} ({} variants)",
        catalog.title,
        catalog.variants.len()
    );
    Ok(catalog)
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::audio;
use crate::error::FetchError;
use crate::streams::{safe_filename, Catalog, StreamKind, StreamVariant};
use crate::tools::{Tool, Toolchain};
use crate::video;

pub const MERGE_FAILED: &str = "FFmpeg merge failed — ensure ffmpeg is installed on the host.";

/// Options for grabbing one variant from a catalogue
#[derive(Debug, Clone)]
pub struct GrabOptions {
    /// Merge video-only variants with the best audio track
    pub merge: bool,
    /// Convert audio-only variants to mp3
    pub mp3: bool,
    /// Output base name without extension; defaults to the scrubbed title
    pub name: Option<String>,
    pub output_dir: PathBuf,
}

impl Default for GrabOptions {
    fn default() -> Self {
        Self {
            merge: true,
            mp3: false,
            name: None,
            output_dir: PathBuf::from("."),
        }
    }
}

/// What a grab handed back to the user
#[derive(Debug, Clone, Serialize)]
pub struct GrabOutcome {
    pub files: Vec<PathBuf>,
    /// Non-fatal problems, e.g. a failed merge that fell back to separate files
    pub notes: Vec<String>,
}

impl GrabOutcome {
    fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.notes.push(message);
    }
}

/// Download the variant at `index` of `catalog` into `options.output_dir`.
///
/// Work happens in a private temporary directory that is removed afterwards;
/// only the delivered files are copied out.
pub async fn grab(
    tools: &Toolchain,
    catalog: &Catalog,
    index: usize,
    options: &GrabOptions,
) -> Result<GrabOutcome> {
    let variant = catalog.variants.get(index).with_context(|| {
        format!(
            "No variant #{} (catalogue has {})",
            index + 1,
            catalog.variants.len()
        )
    })?;

    let base_name = options
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| safe_filename(&catalog.title));
    let base_name = if base_name.is_empty() { "download".to_string() } else { base_name };

    tokio::fs::create_dir_all(&options.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", options.output_dir.display()))?;

    let workdir = tempfile::Builder::new()
        .prefix("clipgrab-")
        .tempdir()
        .context("Failed to create temporary directory")?;

    info!("Downloading \"{}\" as {}", variant.label, base_name);

    let mut outcome = GrabOutcome {
        files: Vec::new(),
        notes: Vec::new(),
    };

    let staged = match variant.kind {
        StreamKind::Progressive | StreamKind::AudioOnly => {
            let path = fetch_variant(tools, catalog, variant, workdir.path(), &base_name).await?;

            if options.mp3 && variant.kind == StreamKind::AudioOnly {
                let mp3 = workdir.path().join(format!("{base_name}.mp3"));
                match audio::extract_mp3(tools, &path, &mp3).await {
                    Ok(()) => vec![mp3],
                    Err(e) => {
                        outcome.note(format!(
                            "MP3 conversion failed ({}); keeping the original file",
                            e.brief()
                        ));
                        vec![path]
                    }
                }
            } else {
                vec![path]
            }
        }
        StreamKind::VideoOnly => {
            let video_path =
                fetch_variant(tools, catalog, variant, workdir.path(), &format!("{base_name}.video"))
                    .await?;

            if !options.merge {
                vec![video_path]
            } else if let Some(best_audio) = catalog.best_audio() {
                let audio_path = fetch_variant(
                    tools,
                    catalog,
                    best_audio,
                    workdir.path(),
                    &format!("{base_name}.audio"),
                )
                .await?;

                let merged = workdir.path().join(format!("{base_name}.mp4"));
                match video::merge_streams(tools, &video_path, &audio_path, &merged).await {
                    Ok(()) => vec![merged],
                    Err(FetchError::ToolMissing(_) | FetchError::ToolFailed { .. }) => {
                        outcome.note(MERGE_FAILED);
                        vec![video_path, audio_path]
                    }
                    Err(e) => return Err(e).context("Merge error"),
                }
            } else {
                outcome.note("No audio stream available to merge — offering video file only.");
                vec![video_path]
            }
        }
    };

    for path in staged {
        let delivered = deliver(&path, &options.output_dir).await?;
        outcome.files.push(delivered);
    }

    workdir.close().context("Failed to remove temporary directory")?;

    Ok(outcome)
}

/// Download exactly one format id into `dir` as `<stem>.<ext>`.
async fn fetch_variant(
    tools: &Toolchain,
    catalog: &Catalog,
    variant: &StreamVariant,
    dir: &Path,
    stem: &str,
) -> Result<PathBuf> {
    let target = dir.join(format!("{stem}.{}", variant.ext));

    let args: Vec<String> = vec![
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--quiet".to_string(),
        "--format".to_string(),
        variant.format_id.clone(),
        "--output".to_string(),
        target.to_string_lossy().into_owned(),
        catalog.url.clone(),
    ];

    tools
        .run(Tool::YtDlp, &args)
        .await
        .with_context(|| format!("Download failed: {}", variant.label))?;

    if !target.exists() {
        anyhow::bail!("Downloaded file not found: {}", target.display());
    }

    info!("Downloaded {} to {}", variant.format_id, target.display());
    Ok(target)
}

/// Copy a staged file into the output directory, keeping its name.
async fn deliver(path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .with_context(|| format!("No file name in {}", path.display()))?;
    let destination = output_dir.join(name);

    tokio::fs::copy(path, &destination)
        .await
        .with_context(|| format!("Failed to copy to {}", destination.display()))?;

    info!("Saved {}", destination.display());
    Ok(destination)
}

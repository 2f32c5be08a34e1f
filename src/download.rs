use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

use crate::error::{FetchError, INVALID_URL};
use crate::quality::Quality;
use crate::tools::{Tool, Toolchain};

/// Output name pattern handed to yt-dlp inside a job directory
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Check that `input` is an absolute http(s) URL with a host.
pub fn parse_media_url(input: &str) -> Result<Url, FetchError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidUrl("URL is required".to_string()));
    }

    let url = Url::parse(trimmed).map_err(|e| {
        debug!("Rejecting {:?}: {}", trimmed, e);
        FetchError::InvalidUrl(INVALID_URL.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        debug!("Rejecting {:?}: scheme {} or missing host", trimmed, url.scheme());
        return Err(FetchError::InvalidUrl(INVALID_URL.to_string()));
    }

    Ok(url)
}

/// Arguments for downloading `url` with a preset into `job_dir`
pub fn preset_args(tools: &Toolchain, url: &Url, quality: Quality, job_dir: &Path) -> Vec<String> {
    let output_template = job_dir.join(OUTPUT_TEMPLATE);

    let mut args: Vec<String> = [
        "--no-playlist",
        "--no-warnings",
        "--quiet",
        "--no-simulate",
        "--print",
        "after_move:filepath",
        "--output",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(output_template.to_string_lossy().into_owned());
    args.extend(quality.ytdlp_args());

    if let Some(ffmpeg) = tools.locate(Tool::Ffmpeg) {
        args.push("--ffmpeg-location".to_string());
        args.push(ffmpeg.to_string_lossy().into_owned());
    }

    args.push(url.as_str().to_string());
    args
}

/// Download a video with a quality preset using yt-dlp
pub async fn download_preset(
    tools: &Toolchain,
    url: &Url,
    quality: Quality,
    job_dir: &Path,
) -> Result<PathBuf, FetchError> {
    tokio::fs::create_dir_all(job_dir).await?;

    info!("Downloading {} ({}) into {}", url, quality, job_dir.display());

    let args = preset_args(tools, url, quality, job_dir);
    let output = tools.run(Tool::YtDlp, &args).await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let printed = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back();

    let path = resolve_output(job_dir, printed, quality)?;
    info!("Download finished: {}", path.display());
    Ok(path)
}

/// Find the file yt-dlp produced inside `job_dir`.
///
/// The printed path wins when it points inside the job directory. Otherwise the
/// directory is scanned, skipping partial downloads.
pub fn resolve_output(
    job_dir: &Path,
    printed: Option<&str>,
    quality: Quality,
) -> Result<PathBuf, FetchError> {
    let root = job_dir.canonicalize()?;

    if let Some(printed) = printed {
        let candidate = Path::new(printed);
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            job_dir.join(candidate)
        };
        match candidate.canonicalize() {
            Ok(path) if path.starts_with(&root) && path.is_file() => return Ok(path),
            Ok(path) => warn!("Ignoring printed path outside job dir: {}", path.display()),
            Err(e) => warn!("Printed path {} not usable: {}", printed, e),
        }
    }

    let mut files: Vec<PathBuf> = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| !is_partial(path))
        .collect();
    files.sort();

    if quality.extracts_audio() {
        if let Some(mp3) = files.iter().find(|p| has_extension(p, "mp3")) {
            return Ok(mp3.clone());
        }
    }

    files.into_iter().next().ok_or(FetchError::NoOutput)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_partial(path: &Path) -> bool {
    has_extension(path, "part") || has_extension(path, "ytdl") || has_extension(path, "temp")
}

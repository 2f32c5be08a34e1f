use std::path::Path;

use tracing::info;

use crate::error::FetchError;
use crate::tools::{Tool, Toolchain};

/// Mux a video-only and an audio-only file into one container without re-encoding
pub async fn merge_streams(
    tools: &Toolchain,
    video: &Path,
    audio: &Path,
    output: &Path,
) -> Result<(), FetchError> {
    info!(
        "Merging {} + {} into {}",
        video.display(),
        audio.display(),
        output.display()
    );

    let args = merge_args(video, audio, output);
    tools.run(Tool::Ffmpeg, &args).await?;

    if !output.exists() {
        return Err(FetchError::NoOutput);
    }

    Ok(())
}

fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().into_owned(),
        "-i".to_string(),
        audio.to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

use std::path::Path;

use tracing::info;

use crate::error::FetchError;
use crate::tools::{Tool, Toolchain};

/// Re-encode an audio (or video) file to mp3 at 192 kbit/s, 44.1 kHz
pub async fn extract_mp3(tools: &Toolchain, input: &Path, output: &Path) -> Result<(), FetchError> {
    info!("Converting {} to mp3", input.display());

    let args = mp3_args(input, output);
    tools.run(Tool::Ffmpeg, &args).await?;

    if !output.exists() {
        return Err(FetchError::NoOutput);
    }

    info!("MP3 written to {}", output.display());
    Ok(())
}

fn mp3_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(), // overwrite
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vn".to_string(),
        "-ab".to_string(),
        "192k".to_string(),
        "-ar".to_string(),
        "44100".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp3_args_drop_video_and_set_bitrate() {
        let args = mp3_args(Path::new("in.webm"), Path::new("out.mp3"));
        assert_eq!(
            args,
            ["-y", "-i", "in.webm", "-vn", "-ab", "192k", "-ar", "44100", "out.mp3"]
        );
    }
}

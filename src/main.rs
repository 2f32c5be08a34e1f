use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use clipgrab::config::{ServeArgs, ToolArgs};
use clipgrab::dashboard::{self, GrabOptions};
use clipgrab::download::{download_preset, parse_media_url};
use clipgrab::error::FFMPEG_NOT_INSTALLED;
use clipgrab::quality::Quality;
use clipgrab::server;
use clipgrab::streams::{self, Catalog};
use clipgrab::tools::Toolchain;

#[derive(Parser)]
#[command(name = "clipgrab")]
#[command(about = "Download videos with yt-dlp and ffmpeg from a web form or the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    tools: ToolArgs,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web form (default)
    Serve,
    /// Download one video with a quality preset
    Download {
        /// Video URL
        url: String,
        /// single_best, best, 1080p, 720p, 480p, 360p or audio
        #[arg(short, long, default_value = "single_best")]
        quality: String,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// List the stream variants of a video
    Streams {
        /// Video URL (watch, embed or youtu.be link)
        url: String,
        /// Print the catalogue as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download one listed variant, merging adaptive video with audio
    Grab {
        /// Video URL (watch, embed or youtu.be link)
        url: String,
        /// Number of the variant as printed by `streams`
        #[arg(short, long)]
        pick: usize,
        /// Keep video-only variants silent instead of merging best audio
        #[arg(long)]
        no_merge: bool,
        /// Convert audio-only variants to mp3
        #[arg(long)]
        mp3: bool,
        /// File name without extension (defaults to the video title)
        #[arg(short, long)]
        name: Option<String>,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("clipgrab=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let tools = cli.tools.toolchain();

    match cli.command {
        Some(Commands::Serve) => server::serve(tools, &cli.serve).await?,
        Some(Commands::Download { url, quality, output }) => {
            download_single(&tools, &url, &quality, &output).await?
        }
        Some(Commands::Streams { url, json }) => {
            let catalog = streams::fetch_catalog(&tools, &url).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                print_catalog(&catalog);
            }
        }
        Some(Commands::Grab {
            url,
            pick,
            no_merge,
            mp3,
            name,
            output,
        }) => {
            let catalog = streams::fetch_catalog(&tools, &url).await?;
            let index = pick
                .checked_sub(1)
                .context("Variants are numbered from 1")?;
            let options = GrabOptions {
                merge: !no_merge,
                mp3,
                name,
                output_dir: output,
            };
            let outcome = dashboard::grab(&tools, &catalog, index, &options).await?;
            for note in &outcome.notes {
                eprintln!("note: {note}");
            }
            for file in &outcome.files {
                println!("{}", file.display());
            }
        }
        None => {
            info!("No subcommand given, starting the web form");
            server::serve(tools, &cli.serve).await?
        }
    }

    Ok(())
}

async fn download_single(tools: &Toolchain, url: &str, quality: &str, output: &Path) -> Result<()> {
    let url = parse_media_url(url)?;
    let quality: Quality = quality.parse()?;
    if quality.requires_ffmpeg() && !tools.ffmpeg_available() {
        anyhow::bail!(FFMPEG_NOT_INSTALLED);
    }

    std::fs::create_dir_all(output)?;
    let job_dir = tempfile::Builder::new()
        .prefix(".clipgrab-")
        .tempdir_in(output)
        .context("Failed to create job directory")?;

    let path = download_preset(tools, &url, quality, job_dir.path())
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let name = path.file_name().context("Downloaded file has no name")?;
    let destination = output.join(name);
    tokio::fs::rename(&path, &destination)
        .await
        .with_context(|| format!("Failed to move file to {}", destination.display()))?;

    info!("Saved {}", destination.display());
    println!("{}", destination.display());
    Ok(())
}

fn print_catalog(catalog: &Catalog) {
    println!("{}", catalog.title);

    let mut facts = Vec::new();
    if let Some(author) = &catalog.author {
        facts.push(format!("Channel: {author}"));
    }
    if let Some(duration) = catalog.duration_seconds {
        facts.push(format!("Duration: {duration}s"));
    }
    if let Some(views) = catalog.views {
        facts.push(format!("Views: {views}"));
    }
    if let Some(date) = catalog.upload_date {
        facts.push(format!("Uploaded: {date}"));
    }
    if !facts.is_empty() {
        println!("{}", facts.join("  •  "));
    }
    println!();

    if catalog.variants.is_empty() {
        println!("No downloadable streams found.");
        return;
    }
    for (i, variant) in catalog.variants.iter().enumerate() {
        println!("{:>3}. {}", i + 1, variant.label);
    }
}

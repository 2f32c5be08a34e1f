//! Download videos through yt-dlp and ffmpeg, from a small web form or from
//! the command line.

pub mod audio;
pub mod config;
pub mod dashboard;
pub mod download;
pub mod error;
pub mod quality;
pub mod server;
pub mod streams;
pub mod tools;
pub mod video;

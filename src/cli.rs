use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum EventFormat {
    /// Progress bars on stderr
    Bar,
    /// One JSON object per progress event on stdout
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URL to download
    #[arg(index = 1)]
    pub url: String,

    /// Output file (defaults to the file name from the URL inside --download-dir)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Directory to save the file in when --output is not given
    #[arg(short = 'd', long = "download-dir", default_value = "downloads")]
    pub download_dir: PathBuf,

    /// Number of parts fetched concurrently
    #[arg(short = 's', long, default_value_t = 8)]
    pub split: usize,

    /// Where in-flight state is saved on pause or failure (defaults to <output>.state)
    #[arg(long = "state-file")]
    pub state_file: Option<PathBuf>,

    /// How progress is reported
    #[arg(long, value_enum, default_value = "bar")]
    pub events: EventFormat,
}

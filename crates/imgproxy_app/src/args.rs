use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "imgproxy",
    version,
    about = "Rewrite the image URLs of a saved HTML page through an image proxy",
    long_about = None
)]
pub struct CliArgs {
    /// Saved HTML page to rewrite.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Address the page was served from; relative URLs resolve against it.
    #[arg(long, value_name = "URL")]
    pub page_url: String,

    /// RON file with proxy settings. Missing fields keep their defaults.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Where to write the rewritten page. Defaults to stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Virtual milliseconds to run periodic scans before stopping.
    #[arg(long, value_name = "MS", default_value_t = 3000)]
    pub run_ms: u64,

    /// Turn on the engine's debug logging.
    #[arg(long)]
    pub debug: bool,

    /// Where log output goes.
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    pub log: LogDestination,
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogDestination {
    /// Write to ./imgproxy.log in the current directory.
    File,
    /// Write to the terminal (stderr).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

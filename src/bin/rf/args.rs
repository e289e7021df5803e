//! Command-line argument definitions for the `rf` binary.
use clap::Parser;

/// A resumable, range-parallel file downloader.
///
/// The file is split into byte ranges fetched concurrently into segment
/// files, which are merged once every range is complete. Re-running the same
/// command after an interruption resumes from the segments on disk.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// The URL of the file to download.
    #[arg(short, long, visible_alias = "url")]
    pub link: String,

    /// Number of ranges downloaded concurrently.
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub threads: Option<u64>,

    /// Split into ranges of at most this many bytes instead of a fixed count.
    ///
    /// Every range keeps a segment file open while downloading; a run is
    /// refused when the file would need more than 1024 ranges.
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub block_size: Option<u64>,

    /// Working directory for segments and the final file.
    #[arg(short, long)]
    pub dir: Option<String>,

    /// The output file name. Defaults to the name advertised by the server.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the success summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

//! # rangefetch
//!
//! `rangefetch` downloads a file over HTTP by splitting it into byte ranges
//! and fetching them concurrently. It supports:
//! - Fixed-count or block-size partitioning
//! - Resuming from segment files left by an interrupted run
//! - Ordered merge of segments into the final file
//! - A single-stream fallback for servers without range support
//!
//! ## Example Usage
//!
//! ```no_run
//! use rangefetch::{DownloadConfig, Downloader, Outcome};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let downloader = Downloader::new(DownloadConfig::default())?;
//! if let Outcome::Completed(summary) = downloader.run("https://example.com/file.iso").await? {
//!     println!("{} bytes in {:?}", summary.bytes, summary.elapsed);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod finalize;
pub mod merge;
pub mod observer;
pub mod partition;
pub mod probe;
pub mod segment;
pub mod state;

pub use config::{DownloadConfig, Settings};
pub use downloader::{Downloader, Outcome, Summary};
pub use error::{Error, Result, RunError, Stage};
pub use partition::{Partition, Plan};
pub use state::{DownloadJob, Phase, Range};

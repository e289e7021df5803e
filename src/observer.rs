//! Progress reporting hooks for fetch tasks.
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};

/// Receives progress events from a single fetch task.
pub trait ProgressObserver: Send + Sync {
    /// `n` more bytes were written to the segment.
    fn inc(&self, n: u64);
    fn message(&self, msg: String);
    fn finish(&self);
}

/// Renders progress with an `indicatif` bar.
pub struct ConsoleObserver {
    pub pb: ProgressBar,
}

impl ConsoleObserver {
    /// Adds a bar for one range to `multi`, pre-filled with the bytes a
    /// previous run already fetched.
    pub fn for_range(multi: &MultiProgress, label: String, total: u64, done: u64) -> Self {
        let pb = multi.add(ProgressBar::new(total));
        if let Ok(style) = ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        ) {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.set_position(done);
        pb.set_message(label);
        Self { pb }
    }
}

impl ProgressObserver for ConsoleObserver {
    fn inc(&self, n: u64) {
        self.pb.inc(n);
    }

    fn message(&self, msg: String) {
        self.pb.set_message(msg);
    }

    fn finish(&self) {
        self.pb.finish();
    }
}

/// Discards all progress events.
pub struct SilentObserver;

impl ProgressObserver for SilentObserver {
    fn inc(&self, _n: u64) {}
    fn message(&self, _msg: String) {}
    fn finish(&self) {}
}

/// Log sink that hides the progress bars while a line is written to stderr,
/// so log output does not tear the bars apart.
#[derive(Clone)]
pub struct ProgressLogWriter {
    multi: MultiProgress,
}

impl ProgressLogWriter {
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl Write for ProgressLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

// src/progress.rs

//! Progress reporting for batch operations
//!
//! The `ProgressTracker` trait is the interface the Fetcher reports through.
//! Implementations:
//! - `BarProgress`: an indicatif bar, for interactive terminals
//! - `LogProgress`: periodic tracing lines, for logs and CI
//! - `SilentProgress`: no-op for library callers and tests
//!
//! Use [`for_terminal`] to pick between the bar and log lines.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Thread-safe progress reporting
pub trait ProgressTracker: Send + Sync {
    /// Set the current status message
    fn set_message(&self, message: &str);

    /// Increment progress by the given amount
    fn increment(&self, amount: u64);

    /// Finish successfully with a message
    fn finish_with_message(&self, message: &str);

    /// Finish with an error/abandonment message
    fn finish_with_error(&self, message: &str);
}

/// No-op tracker
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl SilentProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressTracker for SilentProgress {
    fn set_message(&self, _message: &str) {}

    fn increment(&self, _amount: u64) {}

    fn finish_with_message(&self, _message: &str) {}

    fn finish_with_error(&self, _message: &str) {}
}

/// Logging progress tracker
///
/// Logs at info level roughly every tenth of the way through.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    position: AtomicU64,
    length: u64,
    /// Log interval - only log every N increments to avoid spam
    log_interval: u64,
}

impl LogProgress {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            position: AtomicU64::new(0),
            length,
            log_interval: std::cmp::max(1, length / 10),
        }
    }

    /// Advance and return the position and percentage when a log line is due
    fn advance(&self, amount: u64) -> Option<(u64, u64)> {
        let old_pos = self.position.fetch_add(amount, Ordering::Relaxed);
        let new_pos = old_pos + amount;
        if self.length > 0 && new_pos / self.log_interval > old_pos / self.log_interval {
            Some((new_pos, (new_pos * 100) / self.length))
        } else {
            None
        }
    }
}

impl ProgressTracker for LogProgress {
    fn set_message(&self, _message: &str) {}

    fn increment(&self, amount: u64) {
        if let Some((position, percent)) = self.advance(amount) {
            info!("{}: {}% ({}/{})", self.name, percent, position, self.length);
        }
    }

    fn finish_with_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn finish_with_error(&self, message: &str) {
        warn!("{}: {}", self.name, message);
    }
}

/// Terminal progress bar counting completed items
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(name: &str, length: u64) -> Self {
        let bar = ProgressBar::new(length);
        let style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_prefix(name.to_string());
        Self { bar }
    }
}

impl ProgressTracker for BarProgress {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

/// A bar when stderr is a terminal, log lines otherwise
pub fn for_terminal(name: &str, length: u64) -> Box<dyn ProgressTracker> {
    if std::io::stderr().is_terminal() {
        Box::new(BarProgress::new(name, length))
    } else {
        Box::new(LogProgress::new(name, length))
    }
}

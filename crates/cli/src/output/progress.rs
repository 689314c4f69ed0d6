//! Progress display for transfers
//!
//! A file-count bar for downloads and a spinner for remote lookups and
//! uploads. Both stay hidden in quiet or JSON mode and with `--no-progress`.

use std::time::Duration;

use indicatif::ProgressStyle;

use super::OutputConfig;

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files {wide_msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

/// Progress bar wrapper; a no-op when progress is disabled
#[derive(Debug)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

fn enabled(config: &OutputConfig) -> bool {
    !(config.quiet || config.json || config.no_progress)
}

impl ProgressBar {
    /// Create a bar counting `total` files
    pub fn new(config: OutputConfig, total: u64) -> Self {
        let bar = enabled(&config).then(|| {
            let style = ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            indicatif::ProgressBar::new(total).with_style(style)
        });
        Self { bar }
    }

    /// Create a spinner for work of unknown length
    pub fn spinner(config: OutputConfig, message: &str) -> Self {
        let bar = enabled(&config).then(|| {
            let style = ProgressStyle::default_spinner()
                .template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let bar = indicatif::ProgressBar::new_spinner()
                .with_style(style)
                .with_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Self { bar }
    }

    /// Count finished files
    pub fn inc(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    /// Show the file currently being transferred
    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Check if progress bar is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}

//! Progress display for batched fixes

use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar counting fixes
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Drives a progress bar from `(done, total, label)` callbacks
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    pub fn new(total: usize, message: &str) -> Self {
        eprintln!("{message}");
        Self {
            pb: create_progress_bar(total as u64),
        }
    }

    pub fn update(&self, done: usize, total: usize, label: &str) {
        self.pb.set_length(total as u64);
        self.pb.set_position(done as u64);
        self.pb.set_message(label.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.pb.finish_with_message(message.to_string());
    }

    pub fn abandon(&self, message: &str) {
        self.pb.abandon_with_message(message.to_string());
    }
}

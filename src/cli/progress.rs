//! CLI-specific progress handling for streamget
//!
//! Drives an indicatif bar from download events.

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {bytes_per_sec} ETA: {eta}";

const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bytes} {bytes_per_sec}";

/// Creates a progress bar, or a spinner when the size is unknown
pub fn create_progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(BAR_TEMPLATE)
                    .expect("Failed to create progress style")
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template(SPINNER_TEMPLATE)
                    .expect("Failed to create spinner style"),
            );
            pb
        }
    }
}

/// Progress display for a single download
pub struct ProgressManager {
    pub pb: Option<ProgressBar>,
}

impl ProgressManager {
    /// Create a new progress manager; the bar appears on `start`
    pub fn new(message: &str) -> Self {
        eprintln!("{}", message);
        Self { pb: None }
    }

    pub fn start(&mut self, total_size: Option<u64>) {
        self.pb = Some(create_progress_bar(total_size));
    }

    pub fn set_bytes(&self, received: u64) {
        if let Some(pb) = &self.pb {
            pb.set_position(received);
        }
    }

    pub fn finish(&self, message: &str) {
        if let Some(pb) = &self.pb {
            pb.finish_with_message(message.to_string());
        }
    }

    pub fn abandon(&self) {
        if let Some(pb) = &self.pb {
            pb.abandon();
        }
    }
}

//! Terminal progress display for downloads.

use indicatif::{ProgressBar, ProgressStyle};

/// Byte-accurate progress bar for one download.
pub struct DownloadProgress {
    bar: ProgressBar,
}

impl DownloadProgress {
    /// Creates a bar spanning `total` bytes. When the size is unknown the
    /// bar degrades to a spinner.
    pub fn new(name: &str, total: Option<u64>) -> Self {
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{msg} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                        )
                        .expect("static progress template")
                        .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{msg} {spinner} {bytes} ({bytes_per_sec})")
                        .expect("static spinner template"),
                );
                bar
            }
        };
        bar.set_message(name.to_string());
        Self { bar }
    }

    /// Moves the bar to `bytes` received so far.
    pub fn update(&self, bytes: u64) {
        self.bar.set_position(bytes);
    }

    pub fn finish(&self) {
        self.bar.finish();
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

/// Renders a byte count for listings: `1.5 MiB`, `312 B`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

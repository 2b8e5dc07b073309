use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Stage narration for the acquisition pipeline.
///
/// One line per stage, so when a retry recovers silently the user still sees
/// which stage failed. Warnings (checksum demotions, retry notices) go
/// through `log` instead.
pub struct Steps;

impl Steps {
    pub fn new() -> Self {
        Steps
    }

    pub fn start(&self, msg: impl AsRef<str>) {
        println!("{} {}", "→".cyan(), msg.as_ref());
    }

    pub fn done(&self) {
        println!("  {}", "✓ done".green());
    }

    pub fn fail(&self, err: &dyn std::fmt::Display) {
        eprintln!("  {} {}", "✗".red(), err);
    }
}

impl Default for Steps {
    fn default() -> Self {
        Steps::new()
    }
}

/// Progress bar for a download; hidden when the content length is unknown.
pub fn download_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template("  {bar:40.cyan/blue} {bytes}/{total_bytes}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        None => ProgressBar::hidden(),
    }
}

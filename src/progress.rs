//! Progress indicators for rgsync CLI.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Start a spinner with a message.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Replace the spinner with a success line.
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("  {} {}", "✓".green(), msg);
}

/// Replace the spinner with a failure line.
pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    println!("  {} {}", "✗".red(), msg);
}

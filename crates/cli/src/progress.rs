use indicatif::{ProgressBar, ProgressStyle};

use crate::output::Formatter;

/// Spinner for a single remote transfer; hidden in JSON and quiet mode
pub fn spinner(formatter: &Formatter, msg: &str) -> ProgressBar {
    if formatter.is_json() || formatter.is_quiet() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

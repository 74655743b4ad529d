//! Terminal progress for realization

use declarative::{ProgressCallback, Resource, ResourceOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use pkgkit::{FailureKind, RetryCallback};
use shellkit::ShellResult;
use std::time::Duration;

use crate::ui;

const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const TICK_INTERVAL_MS: u64 = 80;

/// Create a spinner with the standard styling
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        pb.set_style(style.tick_chars(SPINNER_CHARS));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(TICK_INTERVAL_MS));
    pb
}

/// Spinner while a resource runs, one line per outcome
///
/// With `quiet` only failures are printed.
pub struct ConsoleProgress {
    current: Option<ProgressBar>,
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self { current: None, quiet }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_resource_start(&mut self, resource: &Resource) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
        if !self.quiet {
            self.current = Some(spinner(&resource.to_string()));
        }
    }

    fn on_resource_complete(&mut self, outcome: &ResourceOutcome) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
        if !self.quiet || !outcome.result.is_success() {
            println!("{}", ui::outcome_line(outcome));
        }
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}

/// Prints package retries and metadata refreshes
pub struct ConsoleRetry;

impl RetryCallback for ConsoleRetry {
    fn on_retry(&self, attempt: u32, max_attempts: u32, kind: FailureKind, delay: Duration) {
        ui::warn(&format!(
            "Attempt {attempt}/{max_attempts} failed ({kind}), retrying in {}s",
            delay.as_secs()
        ));
    }

    fn on_refresh(&self, result: &ShellResult) {
        if result.is_success() {
            ui::dim("Refreshed package metadata");
        } else {
            ui::warn("Package metadata refresh failed");
        }
    }
}

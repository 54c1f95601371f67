//! Progress indicators for azrm CLI.
//!
//! Long-running Resource Manager operations are polled for minutes; the
//! spinner shows which wait is in progress and how many polls are left.

use console::Term;
use converge::{LogCallback, PollCallback, ResourceKey};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while a reconciliation runs.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Start a spinner; hidden when `visible` is false or stderr is not a terminal.
    pub fn start(msg: &str, visible: bool) -> Self {
        let bar = if visible && Term::stderr().is_term() {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")
            {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(msg.to_string());
        Self { bar }
    }

    /// Hide the spinner while `f` runs (prompts, printed output).
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }

    /// Remove the spinner from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PollCallback for Spinner {
    fn on_wait(
        &self,
        resource: &ResourceKey,
        what: &str,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    ) {
        LogCallback.on_wait(resource, what, attempt, max_attempts, delay);
        self.bar.set_message(format!(
            "Waiting for {what} of {resource} (poll {attempt}/{max_attempts})"
        ));
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

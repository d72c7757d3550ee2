//! Spinner driven by pipeline state changes.

use std::time::Duration;

use articlegen_core::{PipelineObserver, PipelineState};
use articlegen_shared::RequestId;
use indicatif::{ProgressBar, ProgressStyle};

/// CLI progress reporter using an indicatif spinner on stderr.
pub(crate) struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    /// Clear the spinner, whatever state the pipeline stopped in.
    pub(crate) fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

fn state_message(state: PipelineState) -> Option<&'static str> {
    match state {
        PipelineState::Researching => Some("Researching topic"),
        PipelineState::Researched => Some("Research complete"),
        PipelineState::Synthesizing => Some("Writing article"),
        PipelineState::Synthesized | PipelineState::Validating => Some("Checking draft"),
        PipelineState::Repairing => Some("Draft too short, expanding"),
        PipelineState::Idle | PipelineState::Done | PipelineState::Failed => None,
    }
}

impl PipelineObserver for CliProgress {
    fn state_changed(&self, _request_id: &RequestId, _from: PipelineState, to: PipelineState) {
        if to.is_terminal() {
            self.spinner.finish_and_clear();
        } else if let Some(message) = state_message(to) {
            self.spinner.set_message(message);
        }
    }

    fn draft_validated(&self, round: u32, word_count: usize, min_words: usize) {
        self.spinner
            .set_message(format!("Draft {}: {word_count}/{min_words} words", round + 1));
    }
}

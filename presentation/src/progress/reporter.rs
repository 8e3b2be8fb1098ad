//! Spinner that follows the client bootstrap

use butlerd_domain::BootstrapPhase;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::watch;

/// Shows the current bootstrap phase until it settles
pub struct BootstrapReporter {
    bar: ProgressBar,
}

impl BootstrapReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {prefix:.bold} {msg}") {
            bar.set_style(style);
        }
        bar.set_prefix("butlerd");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Human-readable description of a phase
    pub fn describe(phase: BootstrapPhase) -> &'static str {
        match phase {
            BootstrapPhase::NotStarted => "Not started",
            BootstrapPhase::Starting => "Starting daemon...",
            BootstrapPhase::AwaitingListen => "Waiting for daemon to listen...",
            BootstrapPhase::SocketConnecting => "Connecting...",
            BootstrapPhase::Authenticating => "Authenticating...",
            BootstrapPhase::Ready => "Ready",
            BootstrapPhase::Closed => "Closed",
            BootstrapPhase::Failed => "Failed",
        }
    }

    /// Update the spinner on every phase change; returns the settled phase.
    pub async fn follow(&self, mut phases: watch::Receiver<BootstrapPhase>) -> BootstrapPhase {
        loop {
            let phase = *phases.borrow_and_update();
            if phase.is_settled() {
                self.finish(phase);
                return phase;
            }
            self.bar.set_message(Self::describe(phase));
            if phases.changed().await.is_err() {
                self.bar.finish_and_clear();
                return phase;
            }
        }
    }

    fn finish(&self, phase: BootstrapPhase) {
        let status = match phase {
            BootstrapPhase::Ready => format!("{} {}", "v".green(), Self::describe(phase)),
            _ => format!("{} {}", "x".red(), Self::describe(phase)),
        };
        self.bar.finish_with_message(status);
    }
}

impl Default for BootstrapReporter {
    fn default() -> Self {
        Self::new()
    }
}

use crate::ui::icons::{CHECK, CROSS, SPARKLE};
use crate::workflow::{DeployStep, WorkflowObserver};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal progress for a deployment, rendered via `indicatif`.
///
/// Two bars are stacked:
/// - Step bar: how many deploy steps have finished
/// - Activity spinner: the step in progress and its latest message
pub struct DeployUI {
    multi: MultiProgress,
    step_bar: ProgressBar,
    activity: ProgressBar,
    verbose: bool,
}

impl DeployUI {
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let step_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let step_bar = multi.add(ProgressBar::new(DeployStep::ALL.len() as u64));
        step_bar.set_style(step_style);
        step_bar.set_prefix("Deploy");

        let activity_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let activity = multi.add(ProgressBar::new_spinner());
        activity.set_style(activity_style);
        activity.set_prefix("      ");

        Self {
            multi,
            step_bar,
            activity,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Clear both bars once the deploy has ended either way.
    pub fn finish(&self) {
        self.activity.finish_and_clear();
        self.step_bar.finish_and_clear();
    }
}

impl WorkflowObserver for DeployUI {
    fn step_started(&self, step: DeployStep) {
        self.step_bar.set_message(style(step).yellow().to_string());
        self.activity.set_message(format!("{step}..."));
        self.activity.enable_steady_tick(Duration::from_millis(100));
    }

    fn step_finished(&self, step: DeployStep) {
        self.step_bar.inc(1);
        self.print_line(format!("{}{}", CHECK, step));
    }

    fn message(&self, text: &str) {
        self.activity.set_message(style(text).dim().to_string());
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(text).dim()));
        }
    }

    fn failed(&self, step: DeployStep, error: &str) {
        self.print_line(format!(
            "{}{} {}",
            CROSS,
            style(format!("{step} failed:")).red().bold(),
            error
        ));
    }
}

/// A standalone spinner for single long calls such as plan generation.
/// The caller finishes it with `finish_and_clear`.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .expect("progress bar template is a valid static string"),
    );
    bar.set_message(format!("{}{}", SPARKLE, message.into()));
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

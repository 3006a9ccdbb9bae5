//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Longest builder output line shown next to the spinner
const MAX_LINE_WIDTH: usize = 60;

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }

    /// Clear the spinner without any message
    pub fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.clear();
        }
    }
}

/// Live view of the template builder's output.
///
/// Interactive mode shows a spinner with the latest output line and a line
/// count; CI mode echoes every line, indented.
pub struct BuildProgress {
    bar: Option<ProgressBar>,
}

impl BuildProgress {
    pub fn new(ctx: &UiContext, database: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let style = ProgressStyle::default_spinner()
                .template("  {spinner:.blue} Building {prefix}  {msg:.dim}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
            let bar = ProgressBar::new_spinner();
            bar.set_style(style);
            bar.set_prefix(database.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Building {}...", database);
            None
        };
        Self { bar }
    }

    /// Process one line of builder output
    pub fn on_line(&self, line: String) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        match self.bar {
            Some(ref bar) => bar.set_message(shorten(trimmed, MAX_LINE_WIDTH)),
            None => println!("  {}", style(trimmed).dim()),
        }
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// Cut a line to `width` characters, marking the cut with `...`
fn shorten(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    let kept: String = line.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Looking up template...");
        spinner.stop("Found matching database template");
    }

    #[test]
    fn shorten_keeps_short_lines() {
        assert_eq!(shorten("loading base", 60), "loading base");
    }

    #[test]
    fn shorten_cuts_on_char_boundaries() {
        let line = "é".repeat(70);
        let short = shorten(&line, 10);
        assert_eq!(short.chars().count(), 10);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn build_progress_non_interactive() {
        let ctx = UiContext::non_interactive();
        let progress = BuildProgress::new(&ctx, "newdb");
        progress.on_line("INFO newdb odoo.modules.loading: loading 1 modules...".to_string());
        progress.on_line("   ".to_string());
        progress.finish();
    }
}

use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub struct TerminalRenderer {
    style: OutputStyle,
    timestamps: bool,
}

impl TerminalRenderer {
    pub fn new(force_plain: bool, timestamps: bool) -> Self {
        let style = if force_plain || !std::io::stdout().is_terminal() {
            OutputStyle::Plain
        } else {
            OutputStyle::Rich
        };
        Self { style, timestamps }
    }

    pub fn line(&self, status: &str, message: &str) -> String {
        render_status_line(self.style, self.timestamp_prefix(), status, message)
    }

    pub fn status(&self, status: &str, message: &str) {
        println!("{}", self.line(status, message));
    }

    fn timestamp_prefix(&self) -> Option<String> {
        self.timestamps
            .then(|| Local::now().format("%H:%M:%S").to_string())
    }

    pub fn start_progress(&self, label: &str, total: u64) -> InstallProgress {
        let progress_bar = if self.style == OutputStyle::Rich && total > 0 {
            let progress_bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<10} [{bar:20.cyan/blue}] {pos:>3}/{len:3}",
            ) {
                progress_bar.set_style(style.progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        InstallProgress { progress_bar }
    }
}

/// Progress wrapper that keeps status lines readable while a bar is active:
/// lines are routed through the bar so they print above it.
pub struct InstallProgress {
    progress_bar: Option<ProgressBar>,
}

impl InstallProgress {
    pub fn println(&self, line: &str) {
        match &self.progress_bar {
            Some(progress_bar) => progress_bar.println(line),
            None => println!("{line}"),
        }
    }

    pub fn set(&self, current: u64) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.set_position(current);
        }
    }

    pub fn finish_and_clear(self) {
        if let Some(progress_bar) = self.progress_bar {
            progress_bar.finish_and_clear();
        }
    }
}

pub fn render_status_line(
    style: OutputStyle,
    timestamp: Option<String>,
    status: &str,
    message: &str,
) -> String {
    let prefix = timestamp.map(|value| format!("{value} ")).unwrap_or_default();
    let tag = format!("{status:>4}");
    match style {
        OutputStyle::Plain => format!("{prefix}{tag} {message}"),
        OutputStyle::Rich => format!("{prefix}{} {message}", colorize(status_style(status), &tag)),
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "fail" => AnsiColor::BrightRed,
        "warn" => AnsiColor::BrightYellow,
        _ => AnsiColor::BrightBlue,
    };
    Style::new().fg_color(Some(color.into())).effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

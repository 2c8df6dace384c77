use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use phpswitch_switcher::{ProgressEvent, Stage};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

/// Spinner shown while a switch runs. Plain output prints lines only.
pub(crate) struct SwitchProgress {
    style: OutputStyle,
    spinner: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Rich {
            println!("{}", colorize(section_style(), &format!("== {title} ==")));
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_switch_progress(self, version: &str) -> SwitchProgress {
        let spinner = if self.style == OutputStyle::Rich {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
                spinner.set_style(style.tick_chars("|/-\\ "));
            }
            spinner.set_message(format!("switching to {version}"));
            spinner.enable_steady_tick(Duration::from_millis(80));
            Some(spinner)
        } else {
            None
        };

        SwitchProgress {
            style: self.style,
            spinner,
            started_at: Instant::now(),
        }
    }
}

impl SwitchProgress {
    pub(crate) fn observe(&self, event: &ProgressEvent) {
        let line = render_event_line(self.style, event);
        match &self.spinner {
            Some(spinner) => {
                if let ProgressEvent::StageStarted(stage) = event {
                    spinner.set_message(stage.as_str().to_string());
                }
                spinner.println(line);
            }
            None => println!("{line}"),
        }
    }

    pub(crate) fn finish(mut self) -> Duration {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        self.started_at.elapsed()
    }
}

pub(crate) fn current_output_style(force_plain: bool) -> OutputStyle {
    if force_plain {
        return OutputStyle::Plain;
    }
    resolve_output_style(std::io::stdout().is_terminal())
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        "step" => "[..]",
        _ => "[INFO]",
    }
}

pub(crate) fn event_status(event: &ProgressEvent) -> &'static str {
    match event {
        ProgressEvent::Started { .. } | ProgressEvent::StageStarted(_) => "step",
        ProgressEvent::ServiceWarning(_) => "warn",
        ProgressEvent::LinkSkipped { .. } => "info",
        ProgressEvent::StageFinished(_)
        | ProgressEvent::LinkRemoved { .. }
        | ProgressEvent::BackupCreated { .. }
        | ProgressEvent::LinkCreated { .. }
        | ProgressEvent::Completed => "ok",
        ProgressEvent::RelinkFailed(_) | ProgressEvent::Failed(_) => "err",
    }
}

pub(crate) fn render_event_line(style: OutputStyle, event: &ProgressEvent) -> String {
    let message = match event {
        ProgressEvent::StageStarted(stage) => stage_line(*stage),
        other => other.to_string(),
    };
    render_status_line(style, event_status(event), &message)
}

fn stage_line(stage: Stage) -> String {
    match stage {
        Stage::StoppingService => "stopping service...".to_string(),
        Stage::Relinking => "relinking stable paths...".to_string(),
        Stage::StartingService => "starting service...".to_string(),
    }
}

pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

pub(crate) fn active_marker(style: OutputStyle) -> String {
    match style {
        OutputStyle::Plain => "*".to_string(),
        OutputStyle::Rich => colorize(active_style(), "*"),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn active_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightGreen.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

use std::io::Write;
use std::sync::OnceLock;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

static SPINNER: OnceLock<ProgressBar> = OnceLock::new();

pub fn get_spinner() -> &'static ProgressBar {
    SPINNER.get_or_init(init_spinner)
}

fn init_spinner() -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ]));
    }
    pb
}

/// Shows the spinner unless output is quiet or not a terminal.
pub fn start(message: &str, visible: bool) {
    let pb = get_spinner();
    if !visible || !console::Term::stderr().features().is_attended() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return;
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
}

pub fn stop() {
    get_spinner().finish_and_clear();
}

pub fn report_sweep_progress(done: usize, total: usize, alive: usize) {
    get_spinner().set_message(format!(
        "Probed {}/{} addresses, {} alive",
        done.to_string().bold(),
        total,
        alive.to_string().green().bold()
    ));
}

pub fn report_scan_progress(done: usize, total: usize) {
    get_spinner().set_message(format!(
        "Scanned {}/{} hosts",
        done.to_string().bold(),
        total
    ));
}

/// Routes log output around the spinner so the two never interleave.
pub struct SpinnerWriter;

impl Write for SpinnerWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        get_spinner().suspend(|| std::io::stdout().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}

//! # Ping Report Parsing
//!
//! Understands the output of the iputils (Linux) and BSD (macOS) `ping`
//! clients, including locales that print a decimal comma.

use std::sync::LazyLock;

use regex::Regex;

static REPLY_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)time\s*[=<]\s*([0-9]+(?:[.,][0-9]+)?)\s*ms").expect("valid reply regex")
});

static SUMMARY_RTT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\s*([0-9]+(?:[.,][0-9]+)?)/([0-9]+(?:[.,][0-9]+)?)/").expect("valid summary regex")
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingReport {
    pub replied: bool,
    pub latency_ms: Option<f64>,
}

/// Interprets a ping report.
///
/// A zero exit status or any `bytes from` reply line counts as a reply. The
/// latency is the first per-reply `time=` value, falling back to the average
/// of the `min/avg/max` summary line.
pub fn parse_report(text: &str, exit_success: bool) -> PingReport {
    let replied = exit_success || text.to_ascii_lowercase().contains("bytes from");

    let latency_ms = REPLY_TIME
        .captures(text)
        .and_then(|caps| parse_decimal(&caps[1]))
        .or_else(|| {
            SUMMARY_RTT
                .captures(text)
                .and_then(|caps| parse_decimal(&caps[2]))
        });

    PingReport {
        replied,
        latency_ms,
    }
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

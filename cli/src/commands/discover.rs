use std::process::ExitCode;
use std::time::Duration;

use colored::*;
use netsweep_common::network::host::HostRecord;
use netsweep_common::network::interface;
use netsweep_common::{info, success};
use netsweep_core::discovery::SweepSummary;
use netsweep_core::services::Services;
use serde_json::json;

use crate::commands::{Output, print_rate_stats};
use crate::mprint;
use crate::terminal::{colors, format, print, spinner};

/// Exit status when the sweep found nothing alive.
const NOTHING_REACHABLE: u8 = 2;

/// The given target, or the local IPv4 network when none was given.
pub fn target_or_local(target: Option<String>) -> anyhow::Result<String> {
    if let Some(target) = target {
        return Ok(target);
    }
    let Some(local) = interface::local_network() else {
        anyhow::bail!("could not detect the local network; give a CIDR block, range or address");
    };
    info!(
        "Auto-detected {} (local IP: {})",
        local.network.to_string().bold(),
        local.address
    );
    Ok(local.network.to_string())
}

pub async fn discover(target: &str, services: &Services, out: Output) -> anyhow::Result<ExitCode> {
    let mut handle = services.sweep.start(target)?;
    let total = handle.total();
    spinner::start(&format!("Sweeping {total} addresses..."), out.quiet == 0);

    let mut done = 0;
    let mut alive = 0;
    while let Some(batch) = handle.next_batch().await {
        done += batch.len();
        alive += batch.iter().filter(|r| r.reachable).count();
        spinner::report_sweep_progress(done, total, alive);
    }
    let summary = handle.finish().await;
    spinner::stop();

    let hosts: Vec<HostRecord> = services
        .sweep
        .snapshot()
        .into_iter()
        .filter(|record| record.reachable)
        .collect();

    if out.json {
        print::json(&json!({
            "hosts": hosts,
            "summary": summary,
            "rate_limiter": services.limiter.stats(),
        }))?;
    } else {
        discovery_ends(&hosts, &summary, out);
        print_rate_stats(&services.limiter.stats(), out);
    }

    if summary.reachable == 0 {
        return Ok(ExitCode::from(NOTHING_REACHABLE));
    }
    Ok(ExitCode::SUCCESS)
}

fn discovery_ends(hosts: &[HostRecord], summary: &SweepSummary, out: Output) {
    if hosts.is_empty() {
        print::header("zero hosts detected", out.quiet);
        print::no_results("reachable hosts");
        return;
    }

    print::header("network discovery", out.quiet);
    print_hosts(hosts, out);
    print_summary(summary, out);
}

fn print_hosts(hosts: &[HostRecord], out: Output) {
    for (idx, host) in hosts.iter().enumerate() {
        match out.quiet {
            2 => print::print(&host.address.to_string()),
            _ => print_host_tree(host, idx),
        }
        if out.quiet < 2 && idx + 1 != hosts.len() {
            mprint!();
        }
    }
}

fn print_host_tree(host: &HostRecord, idx: usize) {
    let hostname = host.hostname.as_deref().unwrap_or("No hostname");
    print::tree_head(idx, hostname);
    print::as_tree_one_level(format::host_details(host));
}

fn print_summary(summary: &SweepSummary, out: Output) {
    let active_hosts: ColoredString = format!("{} active hosts", summary.reachable).bold().green();
    let named: ColoredString = format!("{} named", summary.named).bold();
    let total_time: ColoredString = format_elapsed(summary.elapsed).bold().yellow();
    let output: ColoredString = format!(
        "Discovery Complete: {active_hosts} of {} ({named}) in {total_time}",
        summary.addresses
    )
    .color(colors::TEXT_DEFAULT);

    match out.quiet {
        0 => {
            print::fat_separator();
            print::centerln(&output.to_string());
        }
        1 => {
            mprint!();
            success!("{}", output)
        }
        _ => {}
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

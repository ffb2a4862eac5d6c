use std::process::ExitCode;

use colored::*;
use netsweep_common::network::target;
use netsweep_common::warn;
use netsweep_core::ports::{TOP_PORTS, parse_ports};
use netsweep_core::ports::service::PortScanOutcome;
use netsweep_core::services::Services;
use serde_json::json;

use crate::commands::{Output, print_rate_stats};
use crate::mprint;
use crate::terminal::{format, print, spinner};

pub async fn scan(
    target: &str,
    ports: Option<&str>,
    services: &Services,
    out: Output,
) -> anyhow::Result<ExitCode> {
    let addresses = target::expand(target)?;
    let ports: Vec<u16> = match ports {
        Some(spec) => parse_ports(spec)?,
        None => TOP_PORTS.to_vec(),
    };

    spinner::start(
        &format!("Scanning {} ports on {} hosts...", ports.len(), addresses.len()),
        out.quiet == 0,
    );

    let mut outcomes: Vec<PortScanOutcome> = Vec::with_capacity(addresses.len());
    for (done, addr) in addresses.iter().enumerate() {
        match services.ports.scan(*addr, &ports).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!("{e}"),
        }
        spinner::report_scan_progress(done + 1, addresses.len());
    }
    spinner::stop();
    services.cache.save();

    if out.json {
        let hosts: Vec<_> = outcomes
            .iter()
            .map(|o| {
                json!({
                    "address": o.result.address,
                    "open_ports": o.result.open_ports,
                    "cached_age_secs": o.cached_age.map(|age| age.as_secs()),
                })
            })
            .collect();
        print::json(&json!({
            "hosts": hosts,
            "cache": services.cache.stats(),
            "rate_limiter": services.limiter.stats(),
        }))?;
        return Ok(ExitCode::SUCCESS);
    }

    print::header("port scan", out.quiet);
    for (idx, outcome) in outcomes.iter().enumerate() {
        print_outcome(idx, outcome, out);
        if out.quiet < 2 && idx + 1 != outcomes.len() {
            mprint!();
        }
    }
    print_rate_stats(&services.limiter.stats(), out);
    Ok(ExitCode::SUCCESS)
}

fn print_outcome(idx: usize, outcome: &PortScanOutcome, out: Output) {
    let result = &outcome.result;
    if out.quiet >= 2 {
        let ports: Vec<String> = result.open_ports.iter().map(u16::to_string).collect();
        print::print(&format!("{} {}", result.address, ports.join(",")));
        return;
    }

    let title = match outcome.cached_age {
        Some(age) => format!(
            "{} {}",
            result.address,
            format!("(cached, age={})", format::age(age)).dimmed()
        ),
        None => result.address.to_string(),
    };
    print::tree_head(idx, &title);
    print::as_tree_one_level(vec![
        format::ip_to_detail(&result.address),
        format::ports_to_detail(&result.ports()),
    ]);
}

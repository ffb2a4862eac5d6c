use std::process::ExitCode;

use colored::*;
use netsweep_common::success;
use netsweep_core::cache::ResultCache;
use serde_json::json;

use crate::commands::{CacheAction, Output};
use crate::terminal::print;

pub fn cache(action: CacheAction, cache: &ResultCache, out: Output) -> anyhow::Result<ExitCode> {
    match action {
        CacheAction::Stats => stats(cache, out)?,
        CacheAction::Prune => {
            let removed = cache.clear_expired();
            report(out, json!({ "removed": removed }), || {
                success!("Removed {removed} expired entries")
            })?;
        }
        CacheAction::Clear => {
            cache.clear();
            report(out, json!({ "cleared": true }), || success!("Cache cleared"))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn stats(cache: &ResultCache, out: Output) -> anyhow::Result<()> {
    let stats = cache.stats();
    if out.json {
        return print::json(&serde_json::to_value(&stats)?);
    }

    print::header("port scan cache", out.quiet);
    let location = stats
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "memory only".to_string());
    print::aligned_line("Location", location, 8);
    print::aligned_line("Entries", stats.entries.to_string().bold(), 8);
    print::aligned_line("TTL", format!("{}s", stats.ttl_secs), 8);
    print::aligned_line("Hits", stats.hits.to_string().green(), 8);
    print::aligned_line("Misses", stats.misses.to_string().yellow(), 8);
    Ok(())
}

fn report(out: Output, value: serde_json::Value, human: impl FnOnce()) -> anyhow::Result<()> {
    if out.json {
        return print::json(&value);
    }
    human();
    Ok(())
}

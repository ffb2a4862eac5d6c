mod commands;
mod terminal;

use std::process::ExitCode;

use commands::{CommandLine, Commands, cache, discover, scan};
use netsweep_common::error;
use netsweep_core::cache::ResultCache;
use netsweep_core::services::Services;

use crate::terminal::{logging, print};

#[tokio::main]
async fn main() -> ExitCode {
    let commands = CommandLine::parse_args();
    logging::init(commands.verbose, commands.json);

    match run(commands).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(commands: CommandLine) -> anyhow::Result<ExitCode> {
    let cfg = commands.config()?;
    let out = commands.output(&cfg);

    match commands.command {
        Commands::Discover { target } => {
            print::header("getting ready for discovery", out.quiet);
            let target = discover::target_or_local(target)?;
            let services = Services::from_config(&cfg);
            discover::discover(&target, &services, out).await
        }
        Commands::Scan { target, ports } => {
            print::header("starting scanner", out.quiet);
            let services = Services::from_config(&cfg);
            scan::scan(&target, ports.as_deref(), &services, out).await
        }
        Commands::Cache { action } => {
            let store = ResultCache::new(cfg.cache.path.clone(), cfg.cache.ttl());
            cache::cache(action, &store, out)
        }
    }
}

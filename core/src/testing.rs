//! Scripted stand-ins for the OS seams, shared by the unit tests.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use netsweep_common::error::ToolError;
use netsweep_common::neighbors::NeighborTable;
use netsweep_common::system::{CommandOutput, CommandRunner};

use crate::scanner::resolver::ReverseLookup;

enum Reply {
    Output(CommandOutput),
    Delayed(Duration, CommandOutput),
    Hang,
}

struct Rule {
    program: String,
    needle: Option<String>,
    reply: Reply,
}

/// Answers commands from a list of rules; unknown programs are "not installed".
#[derive(Default)]
pub struct FakeRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, program: &str, success: bool, text: &str) -> Self {
        self.rule(program, None, Reply::Output(CommandOutput::new(success, text)))
    }

    /// Like [`FakeRunner::respond`], but only when an argument contains `needle`.
    pub fn respond_when(self, program: &str, needle: &str, success: bool, text: &str) -> Self {
        self.rule(
            program,
            Some(needle),
            Reply::Output(CommandOutput::new(success, text)),
        )
    }

    /// Answers after `delay`, or times out if the caller's deadline is shorter.
    pub fn respond_after(self, program: &str, delay: Duration, success: bool, text: &str) -> Self {
        self.rule(
            program,
            None,
            Reply::Delayed(delay, CommandOutput::new(success, text)),
        )
    }

    /// Never answers; the call ends with a timeout once its deadline passes.
    pub fn hang(self, program: &str) -> Self {
        self.rule(program, None, Reply::Hang)
    }

    fn rule(mut self, program: &str, needle: Option<&str>, reply: Reply) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            needle: needle.map(str::to_string),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls().iter().filter(|(p, _)| p == program).count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        let rule = self.rules.iter().find(|rule| {
            rule.program == program
                && rule
                    .needle
                    .as_ref()
                    .is_none_or(|needle| args.iter().any(|a| a.contains(needle.as_str())))
        });

        match rule.map(|r| &r.reply) {
            Some(Reply::Output(out)) => Ok(out.clone()),
            Some(Reply::Delayed(delay, _)) if *delay >= timeout => {
                tokio::time::sleep(timeout).await;
                Err(ToolError::TimedOut {
                    program: program.to_string(),
                    timeout,
                })
            }
            Some(Reply::Delayed(delay, out)) => {
                tokio::time::sleep(*delay).await;
                Ok(out.clone())
            }
            Some(Reply::Hang) => {
                tokio::time::sleep(timeout).await;
                Err(ToolError::TimedOut {
                    program: program.to_string(),
                    timeout,
                })
            }
            None => Err(ToolError::NotFound(program.to_string())),
        }
    }
}

/// PTR answers from a fixed table, optionally after a delay.
#[derive(Default)]
pub struct FakePtr {
    names: HashMap<IpAddr, String>,
    delay: Option<Duration>,
    lookups: AtomicUsize,
}

impl FakePtr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ip: &str, name: &str) -> Self {
        self.names.insert(ip.parse().unwrap(), name.to_string());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseLookup for FakePtr {
    async fn lookup(&self, ip: IpAddr) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.names.get(&ip).cloned()
    }
}

#[derive(Default)]
pub struct FakeNeighbors {
    table: HashMap<IpAddr, String>,
}

impl FakeNeighbors {
    pub fn with(mut self, ip: &str, mac: &str) -> Self {
        self.table.insert(ip.parse().unwrap(), mac.to_string());
        self
    }
}

#[async_trait]
impl NeighborTable for FakeNeighbors {
    async fn snapshot(&self) -> HashMap<IpAddr, String> {
        self.table.clone()
    }
}

use std::io::{self, Write};

use serde::Serialize;

use crate::engine::{ProgressEvent, ProgressSink, RunReport, StageAction, StatusReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_status(result: &StatusReport) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable summary printed after an interactive run.
pub struct SummaryOutput;

impl SummaryOutput {
    pub fn print_run(result: &RunReport) {
        let green = "\x1b[32m";
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";

        println!("{cyan}KIRA-GP {} -> {}{reset}", result.dataset, result.target);
        for outcome in &result.stages {
            match outcome.action {
                StageAction::Skipped => {
                    println!("{green}  = {:<14} already complete{reset}", outcome.stage)
                }
                StageAction::Ran => println!(
                    "{cyan}  + {:<14} ran in {} ms{reset}",
                    outcome.stage, outcome.elapsed_ms
                ),
            }
        }
    }

    pub fn print_status(result: &StatusReport) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let reset = "\x1b[0m";

        println!("dataset {}", result.dataset);
        for status in &result.stages {
            if status.completion.is_complete() {
                println!("{green}  done     {:<14} {}{reset}", status.stage, status.output);
            } else {
                println!(
                    "{yellow}  pending  {:<14} {} ({:?}){reset}",
                    status.stage, status.output, status.completion
                );
            }
        }
    }
}

impl ProgressSink for SummaryOutput {
    fn event(&self, event: ProgressEvent) {
        eprintln!("[{}] {}", event.stage, event.message);
    }
}

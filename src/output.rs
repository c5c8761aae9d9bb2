use std::io::{self, Write};

use serde::Serialize;

use crate::app::{AlignmentsValidation, BuildReport, BuildResult, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// Prints progress and reports to stdout as they happen.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) if event.message.ends_with('!') => {
                println!("\n{} ({:.1}s)\n", event.message, elapsed.as_secs_f64())
            }
            _ => println!("{}", event.message),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_build(result: &BuildResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_report(report: &BuildReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_validation(result: &AlignmentsValidation) -> io::Result<()> {
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

/// Keeps stdout clean for the JSON document; progress still reaches the log.
impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        tracing::debug!(message = %event.message, "progress");
    }
}

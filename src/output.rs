use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{EmitResult, ExtractResult, ProgressEvent, ProgressSink, ResolveResult, RunResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_extract(result: &ExtractResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_resolve(result: &ResolveResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_emit(result: &EmitResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
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

/// Plain-text summaries on stdout; progress goes to the log.
pub struct TextOutput;

impl TextOutput {
    pub fn print_extract(result: &ExtractResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(
            stdout,
            "extract: {} proteins, {} records, {} parameters",
            result.proteins_seen, result.records, result.parameters
        )?;
        writeln!(
            stdout,
            "  unmapped: {} organisms, {} tissues, {} substances",
            result.unmapped_organisms, result.unmapped_tissues, result.unmapped_substances
        )?;
        if result.invalid_records > 0 {
            writeln!(stdout, "  skipped {} invalid records", result.invalid_records)?;
        }
        writeln!(stdout, "  dataset: {}", result.dataset_path)
    }

    pub fn print_resolve(result: &ResolveResult) -> io::Result<()> {
        let stats = &result.stats;
        let mut stdout = io::stdout();
        writeln!(
            stdout,
            "resolve: {} chemicals, {} cached, {} resolved, {} not found",
            result.chemicals, stats.cached, stats.resolved, stats.not_found
        )?;
        writeln!(
            stdout,
            "  without InChI: {}, bad InChI: {}, failed: {}",
            stats.missing_notation, stats.invalid_notation, stats.failed
        )?;
        writeln!(stdout, "  mapping: {}", result.mapping_path)
    }

    pub fn print_emit(result: &EmitResult) -> io::Result<()> {
        writeln!(
            io::stdout(),
            "emit: {} parameters written to {}",
            result.parameters, result.model_path
        )
    }

    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_extract(&result.extract)?;
        Self::print_resolve(&result.resolve)?;
        Self::print_emit(&result.emit)
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

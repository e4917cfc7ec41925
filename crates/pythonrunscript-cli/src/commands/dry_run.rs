use super::{colorize_status, json_pretty, EXIT_SUCCESS};
use pythonrunscript_core::{DryRunReport, Engine};
use pythonrunscript_runtime::Verbosity;
use std::path::Path;

pub fn run(engine: &Engine, script: &Path, verbosity: Verbosity, json: bool) -> Result<u8, String> {
    let report = engine
        .dry_run(script, verbosity)
        .map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(EXIT_SUCCESS)
}

fn print_report(report: &DryRunReport) {
    println!("dry run: nothing will be written\n");
    println!("script:       {}", report.script.display());
    println!("backend:      {}", colorize_status(report.backend));

    for diag in &report.diagnostics {
        println!("ignored:      {} blocks ({})", diag.grammar, diag.error);
    }

    if report.blocks.is_empty() {
        println!("\nno dependency blocks found");
        println!("interpreter:  {}", report.interpreter.display());
        return;
    }

    for block in &report.blocks {
        println!("\n{} block ({} grammar):", block.kind, block.grammar);
        print!("{}", block.rendered);
        if !block.rendered.ends_with('\n') {
            println!();
        }
    }
    println!();

    if let (Some(fp), Some(entry)) = (&report.fingerprint, &report.entry) {
        println!("fingerprint:  {fp}");
        println!("environment:  {}", entry.display());
        let status = if report.entry_exists {
            "exists, would be reused"
        } else {
            "missing, would be created"
        };
        println!("status:       {status}");
    }
    println!("interpreter:  {}", report.interpreter.display());

    if !report.entry_exists && !report.plan.is_empty() {
        println!("\nplan:");
        for step in report.plan.steps() {
            println!("  {step}");
        }
    }
}

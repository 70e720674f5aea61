//! Binary entry point for the `steadystatectl` harness.

use std::error::Error;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use steadystate::cli::{Cli, Command, OutputFormat, RunArgs, RunReport};
use steadystate::metrics::WorkloadCounters;
use steadystate::{Behavior, Interpreter, PhysicsConfig, StdHost, Vm};

fn main() {
    steadystate::logging::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = steadystate::cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Config => emit_config(cli.format, &config)?,
        Command::Run(args) => {
            let (_interp, report) = drive_workload(config, &args)?;
            emit_run_report(cli.format, &report)?;
        }
        Command::Metrics(args) => {
            let (interp, _report) = drive_workload(config, &args)?;
            let row = interp.vm().assemble_metrics_row(timestamp_now(), workload_counters(interp.vm()));
            match cli.format {
                // The row has no richer structure than its CSV form, so
                // `--format json` still emits CSV here (with a header
                // line) rather than fabricating a JSON shape for it.
                OutputFormat::Json => {
                    let mut buf = Vec::new();
                    steadystate::metrics::MetricsRow::write_csv_header(&mut buf)?;
                    row.write_csv_row(&mut buf)?;
                    print!("{}", String::from_utf8_lossy(&buf));
                }
                OutputFormat::Text => row.print_text(std::io::stdout())?,
            }
        }
    }

    Ok(())
}

fn emit_config(format: OutputFormat, config: &PhysicsConfig) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => println!("{}", toml::to_string_pretty(config)?),
    }
    Ok(())
}

fn emit_run_report(format: OutputFormat, report: &RunReport) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => println!(
            "words_defined={} words_executed={} dictionary_lookups={} ticks_run={}",
            report.words_defined, report.words_executed, report.dictionary_lookups, report.ticks_run
        ),
    }
    Ok(())
}

/// Defines either the capsule's words or a small built-in set, drives
/// `iterations` synthetic dispatches round-robin across them, then runs
/// `ticks` heartbeat ticks inline (no background worker: a one-shot CLI
/// invocation outlives no tick period worth spawning a thread for).
fn drive_workload(config: PhysicsConfig, args: &RunArgs) -> Result<(Interpreter, RunReport), Box<dyn Error>> {
    let vm = Vm::new(Arc::new(StdHost), config);
    let mut interp = Interpreter::new(vm);

    let names = match &args.capsule {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            steadystate::capsule::Capsule::load(&bytes).decode_word_names()
        }
        None => builtin_word_names(),
    };

    let mut ids = Vec::with_capacity(names.len());
    for name in &names {
        ids.push(interp.define_native(name, noop)?);
    }

    if !ids.is_empty() {
        for i in 0..args.iterations {
            let id = ids[(i as usize) % ids.len()];
            interp.execute(id)?;
        }
    }

    for _ in 0..args.ticks {
        interp.vm().heartbeat_tick();
    }

    let (words_executed, dictionary_lookups) = interp.vm().counters();
    let report = RunReport {
        words_defined: ids.len(),
        words_executed,
        dictionary_lookups,
        ticks_run: args.ticks,
    };
    Ok((interp, report))
}

fn noop(_: &mut Interpreter) -> steadystate::Result<()> {
    Ok(())
}

fn builtin_word_names() -> Vec<Vec<u8>> {
    [b"DUP".as_slice(), b"SWAP".as_slice(), b"DROP".as_slice(), b"+".as_slice(), b"OVER".as_slice()]
        .into_iter()
        .map(|s| s.to_vec())
        .collect()
}

fn workload_counters(vm: &steadystate::Vm) -> WorkloadCounters {
    let (words_executed, dictionary_lookups) = vm.counters();
    WorkloadCounters {
        words_executed,
        dictionary_lookups,
        ..WorkloadCounters::default()
    }
}

fn timestamp_now() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    secs.to_string()
}
